//! Storage abstractions for state snapshots, the run lease and page artifacts.
//!
//! Everything is kept in one byte-oriented blob store:
//!
//! ```text
//! {root}/
//! ├── check-product-changes/
//! │   ├── default.csv       # Locale state snapshot (unnamed locale)
//! │   ├── en.csv            # Locale state snapshot
//! │   └── running.lock      # Run lease
//! └── public/pdps/          # Rendered product pages
//!     └── products/{urlKey}/{sku}.html
//! ```

pub mod local;
pub mod lock;
#[cfg(test)]
pub(crate) mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod state;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStorage;
pub use lock::{LockStatus, RunLock};
pub use state::StateStore;

/// A byte-oriented key/value store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, returning `None` if it does not exist.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite a blob.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove a blob. Removing a missing blob is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Key of a rendered page artifact for a product path.
pub fn artifact_key(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}.html",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Open the blob store selected by the configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(&config.root))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(
            s3::S3Storage::from_config(&config.bucket, &config.prefix).await?,
        )),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(crate::error::AppError::config(
            "storage.backend = \"s3\" requires the 's3' feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_key() {
        assert_eq!(
            artifact_key("public/pdps", "/products/red-shirt/sku-1"),
            "public/pdps/products/red-shirt/sku-1.html"
        );
        assert_eq!(artifact_key("public/pdps/", "en/p/x"), "public/pdps/en/p/x.html");
    }

    #[tokio::test]
    async fn test_open_local() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            root: tmp.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let store = open(&config).await.unwrap();
        store.write("a/b.txt", b"x").await.unwrap();
        assert_eq!(store.read("a/b.txt").await.unwrap(), Some(b"x".to_vec()));
    }
}
