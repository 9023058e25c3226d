//! AWS Lambda handler for scheduled reconciliation runs.
//!
//! Each invocation:
//! 1. Opens the S3 store (`S3_BUCKET`, `S3_PREFIX`)
//! 2. Loads `config.toml` from `CONFIG_S3_PREFIX` and applies env overrides
//! 3. Runs one locked reconciliation pass and returns its result

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument};

use crate::config::ConfigLoader;
use crate::error::Result;
use crate::models::{Config, RunResult};
use crate::pipeline;
use crate::services::Services;
use crate::storage::BlobStore;
use crate::storage::s3::S3Storage;

const DEFAULT_CONFIG_PREFIX: &str = "config";

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct PollRequest {
    /// Locales to reconcile instead of the configured ones
    #[serde(default)]
    pub locales: Option<Vec<String>>,
}

impl PollRequest {
    fn apply(&self, config: &mut Config) {
        if let Some(locales) = &self.locales {
            config.site.locales = locales
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(event: LambdaEvent<PollRequest>) -> std::result::Result<Value, LambdaError> {
    let (request, _context) = event.into_parts();
    info!("Starting poll: locales={:?}", request.locales);

    match run_poll(&request).await {
        Ok(result) => {
            info!(
                "Poll {:?} in {}ms: {:?}",
                result.state, result.elapsed, result.status
            );
            Ok(serde_json::to_value(result)?)
        }
        Err(e) => {
            error!("Poll failed: {}", e);
            Ok(error_response(&e.to_string()))
        }
    }
}

fn error_response(message: &str) -> Value {
    json!({ "state": "error", "message": message })
}

async fn run_poll(request: &PollRequest) -> Result<RunResult> {
    let storage: Arc<dyn BlobStore> = Arc::new(S3Storage::from_env().await?);

    let prefix = std::env::var("CONFIG_S3_PREFIX").unwrap_or_else(|_| DEFAULT_CONFIG_PREFIX.into());
    let mut config = ConfigLoader::new(storage.clone(), &prefix)
        .load_config_or_default()
        .await?;
    config.apply_env_overrides();
    request.apply(&mut config);

    let services = Services::from_config(&config, storage)?;
    pipeline::run(&config, services).await
}
