//! External collaborators of the reconciliation engine.
//!
//! Each collaborator is a trait so the pipeline can run against the HTTP
//! implementations in production and in-memory fakes in tests:
//! - Product catalog (`CatalogClient`, implemented by `CommerceCatalog`)
//! - Page renderer (`Renderer`, implemented by `HttpRenderer`)
//! - Content admin gateway (`AdminApi`, implemented by `AdminClient`)
//! - Published products index (`PublishedIndex`, implemented by `SpreadsheetIndex`)

mod admin;
mod catalog;
#[cfg(test)]
pub(crate) mod fakes;
mod index;
mod renderer;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BatchResult, CatalogItem, Config, ProductRef, PublishRecord, UnpublishRecord};
use crate::storage::BlobStore;

pub use admin::AdminClient;
pub use catalog::CommerceCatalog;
pub use index::SpreadsheetIndex;
pub use renderer::HttpRenderer;

/// Source of truth for which products exist.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Every product currently listed for the locale.
    async fn fetch_all_skus(&self, locale: Option<&str>) -> Result<Vec<ProductRef>>;

    /// Modification times for the given SKUs. SKUs the catalog no longer
    /// knows are absent from the result.
    async fn fetch_last_modified(
        &self,
        locale: Option<&str>,
        skus: &[String],
    ) -> Result<Vec<CatalogItem>>;
}

/// Produces the HTML of one product page.
///
/// Output must be deterministic for unchanged catalog data, otherwise every
/// render looks like a content change.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, locale: Option<&str>, sku: &str, url_key: &str) -> Result<String>;
}

/// Content admin gateway driving the preview/publish lifecycle.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn start_processing(&self) -> Result<()>;

    /// Wait for in-flight work to finish. Must be called even when the run fails.
    async fn stop_processing(&self) -> Result<()>;

    async fn preview_and_publish(
        &self,
        records: &[PublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult>;

    async fn unpublish_and_delete(
        &self,
        records: &[UnpublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult>;

    /// Durations in milliseconds of every preview request made so far.
    fn preview_durations(&self) -> Vec<f64>;
}

/// Index of pages that were published in an earlier run.
#[async_trait]
pub trait PublishedIndex: Send + Sync {
    async fn published_paths(&self, locale: Option<&str>) -> Result<PublishedPaths>;
}

/// Snapshot of the published index for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedPaths {
    paths: HashMap<String, String>,
}

impl PublishedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sku: impl Into<String>, path: impl Into<String>) {
        self.paths.insert(sku.into(), path.into());
    }

    /// Path a SKU was last published under, if known.
    pub fn lookup_published_path(&self, sku: &str) -> Option<&str> {
        self.paths.get(sku).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PublishedPaths {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut paths = Self::new();
        for (sku, path) in iter {
            paths.insert(sku, path);
        }
        paths
    }
}

/// Everything a reconciliation run talks to.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogClient>,
    pub renderer: Arc<dyn Renderer>,
    pub admin: Arc<dyn AdminApi>,
    pub index: Arc<dyn PublishedIndex>,
    pub storage: Arc<dyn BlobStore>,
}

impl Services {
    /// Build the HTTP collaborators described by the configuration.
    pub fn from_config(config: &Config, storage: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self {
            catalog: Arc::new(CommerceCatalog::new(&config.catalog, &config.site.store_url)?),
            renderer: Arc::new(HttpRenderer::new(&config.renderer)?),
            admin: Arc::new(AdminClient::new(&config.admin, &config.site.org, &config.site.site)?),
            index: Arc::new(SpreadsheetIndex::new(
                &config.site.content_url,
                &config.site.product_page_url_format,
                config.renderer.timeout_secs,
            )?),
            storage,
        })
    }
}
