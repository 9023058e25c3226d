//! AWS S3 storage implementation.
//!
//! Keys are stored under `{bucket}/{prefix}/{key}`. A missing object reads as
//! `None`, matching the local backend.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// S3-backed blob store.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from the ambient AWS configuration.
    ///
    /// `S3_BUCKET` and `S3_PREFIX` take precedence over the given values.
    pub async fn from_config(bucket: &str, prefix: &str) -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| bucket.to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| prefix.to_string());
        if bucket.trim().is_empty() {
            return Err(AppError::config("S3 bucket is not configured"));
        }

        Ok(Self::new(client, bucket, prefix))
    }

    /// Create S3 storage from environment configuration only.
    pub async fn from_env() -> Result<Self> {
        Self::from_config("", "").await
    }

    fn object_key(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        }
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No object at s3://{}/{}", self.bucket, object_key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let object_key = self.object_key(key);
        let content_type = if object_key.ends_with(".html") {
            "text/html; charset=utf-8"
        } else {
            "text/plain; charset=utf-8"
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::debug!("Wrote {} bytes to s3://{}/{}", bytes.len(), self.bucket, object_key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::debug!("Deleted s3://{}/{}", self.bucket, object_key);
        Ok(())
    }
}
