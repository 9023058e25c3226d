//! Configuration loading from a blob store.
//!
//! The lambda keeps `config.toml` next to its data in S3; the CLI reads it
//! from disk with [`Config::load_or_default`].

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::BlobStore;

const CONFIG_FILE: &str = "config.toml";

/// Loads TOML configuration files stored under a key prefix.
pub struct ConfigLoader {
    store: Arc<dyn BlobStore>,
    prefix: String,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn BlobStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn key(&self, file_name: &str) -> String {
        if self.prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.prefix, file_name)
        }
    }

    async fn load_toml<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        let key = self.key(file_name);
        log::info!("Loading config file {}", key);
        let Some(bytes) = self.store.read(&key).await? else {
            return Ok(None);
        };

        let s = String::from_utf8(bytes)
            .map_err(|e| AppError::config(format!("Config file {} is not valid UTF-8: {}", key, e)))?;
        Ok(Some(toml::from_str(&s)?))
    }

    /// Load `config.toml`, failing if it is missing.
    pub async fn load_config(&self) -> Result<Config> {
        self.load_toml(CONFIG_FILE).await?.ok_or_else(|| {
            AppError::config(format!("Config file not found: {}", self.key(CONFIG_FILE)))
        })
    }

    /// Load `config.toml`, falling back to defaults if it is missing.
    pub async fn load_config_or_default(&self) -> Result<Config> {
        match self.load_toml(CONFIG_FILE).await? {
            Some(config) => Ok(config),
            None => {
                log::warn!(
                    "No {} found, using default configuration",
                    self.key(CONFIG_FILE)
                );
                Ok(Config::default())
            }
        }
    }
}
