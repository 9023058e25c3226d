//! Content admin API gateway.
//!
//! Every page goes through two calls: preview then live for publishing,
//! live then preview removal for unpublishing. Calls share one semaphore so
//! the admin service never sees more than `max_concurrent` requests from a
//! run, and transient failures (429, 5xx, network) are retried with
//! exponential backoff.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Client, Method, StatusCode};
use tokio::sync::Semaphore;

use crate::error::{AppError, Result};
use crate::models::{AdminConfig, BatchRecord, BatchResult, PublishRecord, UnpublishRecord};
use crate::services::AdminApi;
use crate::utils::http::{backoff_delay, create_async_client, is_retryable_status};

const PREVIEW: &str = "preview";
const LIVE: &str = "live";

/// HTTP client for the content admin API.
pub struct AdminClient {
    client: Client,
    config: AdminConfig,
    org: String,
    site: String,
    permits: Semaphore,
    max_concurrent: usize,
    processing: AtomicBool,
    preview_durations: Mutex<Vec<f64>>,
}

impl AdminClient {
    pub fn new(config: &AdminConfig, org: &str, site: &str) -> Result<Self> {
        let max_concurrent = config.max_concurrent.max(1);
        Ok(Self {
            client: create_async_client(config.timeout_secs)?,
            config: config.clone(),
            org: org.to_string(),
            site: site.to_string(),
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            processing: AtomicBool::new(false),
            preview_durations: Mutex::new(Vec::new()),
        })
    }

    fn resource_url(&self, stage: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}{}",
            self.config.base_url.trim_end_matches('/'),
            stage,
            self.org,
            self.site,
            self.config.branch,
            path
        )
    }

    fn ensure_processing(&self, operation: &str) -> Result<()> {
        if self.processing.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::admin(operation, 0, "gateway is not processing"))
        }
    }

    /// Issue one admin call, retrying transient failures.
    async fn call(&self, method: Method, stage: &str, path: &str) -> Result<()> {
        let operation = format!("{} {}", method, stage);
        let url = self.resource_url(stage, path);
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::admin(&operation, 0, "gateway closed"))?;

        let mut attempt = 0;
        loop {
            let result = self
                .client
                .request(method.clone(), &url)
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("token {}", self.config.auth_token),
                )
                .send()
                .await;

            let retryable = match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                // Already gone counts as removed.
                Ok(response) if method == Method::DELETE && response.status() == StatusCode::NOT_FOUND => {
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= self.config.max_retries {
                        let text = response.text().await.unwrap_or_default();
                        return Err(AppError::admin(&operation, status.as_u16(), text));
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(AppError::Http(e));
                    }
                    e.to_string()
                }
            };

            let delay = backoff_delay(self.config.retry_base_delay_ms, attempt);
            log::debug!(
                "{} {} failed ({}), retrying in {:?}",
                operation,
                path,
                retryable,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn record_preview_duration(&self, millis: f64) {
        self.preview_durations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(millis);
    }

    async fn publish_one(&self, input: &PublishRecord) -> BatchRecord {
        let mut record = BatchRecord::new(&input.sku, &input.path);
        record.rendered_at = input.rendered_at;

        let started = Instant::now();
        if let Err(e) = self.call(Method::POST, PREVIEW, &input.path).await {
            log::warn!("Preview of {} ({}) failed: {}", input.sku, input.path, e);
            return record;
        }
        record.previewed_at = Some(Utc::now());
        self.record_preview_duration(started.elapsed().as_secs_f64() * 1000.0);

        match self.call(Method::POST, LIVE, &input.path).await {
            Ok(()) => record.published_at = Some(Utc::now()),
            Err(e) => log::warn!("Publish of {} ({}) failed: {}", input.sku, input.path, e),
        }
        record
    }

    async fn unpublish_one(&self, input: &UnpublishRecord) -> BatchRecord {
        let mut record = BatchRecord::new(&input.sku, &input.path);

        if let Err(e) = self.call(Method::DELETE, LIVE, &input.path).await {
            log::warn!("Unpublish of {} ({}) failed: {}", input.sku, input.path, e);
            return record;
        }
        record.live_unpublished_at = Some(Utc::now());

        match self.call(Method::DELETE, PREVIEW, &input.path).await {
            Ok(()) => record.preview_unpublished_at = Some(Utc::now()),
            Err(e) => log::warn!("Preview removal of {} ({}) failed: {}", input.sku, input.path, e),
        }
        record
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn start_processing(&self) -> Result<()> {
        self.processing.store(true, Ordering::SeqCst);
        log::debug!(
            "Admin gateway open for {}/{} ({} concurrent requests)",
            self.org,
            self.site,
            self.max_concurrent
        );
        Ok(())
    }

    async fn stop_processing(&self) -> Result<()> {
        self.processing.store(false, Ordering::SeqCst);
        // Holding every permit means nothing is in flight.
        let drained = self
            .permits
            .acquire_many(self.max_concurrent as u32)
            .await
            .map_err(|_| AppError::admin("stop", 0, "gateway closed"))?;
        drop(drained);
        log::debug!("Admin gateway drained");
        Ok(())
    }

    async fn preview_and_publish(
        &self,
        records: &[PublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult> {
        self.ensure_processing(PREVIEW)?;
        let records = join_all(records.iter().map(|r| self.publish_one(r))).await;
        log::info!(
            "Publish batch {} for locale {}: {}/{} published",
            batch_number,
            locale.unwrap_or("default"),
            records.iter().filter(|r| r.is_published()).count(),
            records.len()
        );
        Ok(BatchResult { records })
    }

    async fn unpublish_and_delete(
        &self,
        records: &[UnpublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult> {
        self.ensure_processing(LIVE)?;
        let records = join_all(records.iter().map(|r| self.unpublish_one(r))).await;
        log::info!(
            "Unpublish batch {} for locale {}: {}/{} unpublished",
            batch_number,
            locale.unwrap_or("default"),
            records.iter().filter(|r| r.is_unpublished()).count(),
            records.len()
        );
        Ok(BatchResult { records })
    }

    fn preview_durations(&self) -> Vec<f64> {
        self.preview_durations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
