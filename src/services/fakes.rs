//! In-memory collaborators for pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    BatchRecord, BatchResult, CatalogItem, ProductRef, PublishRecord, UnpublishRecord,
};
use crate::services::{
    AdminApi, CatalogClient, PublishedIndex, PublishedPaths, Renderer, Services,
};
use crate::storage::memory::MemoryStorage;

#[derive(Default)]
pub(crate) struct FakeCatalog {
    products: Mutex<BTreeMap<String, (Option<String>, Option<i64>)>>,
    failing_locales: Mutex<HashSet<String>>,
}

impl FakeCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, sku: &str, url_key: &str, modified_millis: i64) {
        self.products
            .lock()
            .unwrap()
            .insert(sku.into(), (Some(url_key.into()), Some(modified_millis)));
    }

    /// List a product whose modification time the catalog cannot report.
    pub(crate) fn set_without_timestamp(&self, sku: &str, url_key: &str) {
        self.products
            .lock()
            .unwrap()
            .insert(sku.into(), (Some(url_key.into()), None));
    }

    pub(crate) fn set_without_url_key(&self, sku: &str, modified_millis: i64) {
        self.products
            .lock()
            .unwrap()
            .insert(sku.into(), (None, Some(modified_millis)));
    }

    pub(crate) fn remove(&self, sku: &str) {
        self.products.lock().unwrap().remove(sku);
    }

    pub(crate) fn fail_for(&self, locale: &str) {
        self.failing_locales.lock().unwrap().insert(locale.into());
    }

    fn check(&self, locale: Option<&str>) -> Result<()> {
        match locale {
            Some(l) if self.failing_locales.lock().unwrap().contains(l) => {
                Err(AppError::catalog("fake", format!("catalog down for {l}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_all_skus(&self, locale: Option<&str>) -> Result<Vec<ProductRef>> {
        self.check(locale)?;
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .map(|(sku, (url_key, _))| ProductRef {
                sku: sku.clone(),
                url_key: url_key.clone(),
            })
            .collect())
    }

    async fn fetch_last_modified(
        &self,
        locale: Option<&str>,
        skus: &[String],
    ) -> Result<Vec<CatalogItem>> {
        self.check(locale)?;
        let products = self.products.lock().unwrap();
        Ok(skus
            .iter()
            .filter_map(|sku| {
                products.get(sku).map(|(url_key, millis)| CatalogItem {
                    sku: sku.clone(),
                    url_key: url_key.clone(),
                    last_modified_at: millis.and_then(|m| Utc.timestamp_millis_opt(m).single()),
                })
            })
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeRenderer {
    pages: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    renders: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Override the page content for a SKU.
    pub(crate) fn set_page(&self, sku: &str, html: &str) {
        self.pages.lock().unwrap().insert(sku.into(), html.into());
    }

    pub(crate) fn fail(&self, sku: &str) {
        self.failing.lock().unwrap().insert(sku.into());
    }

    pub(crate) fn heal(&self, sku: &str) {
        self.failing.lock().unwrap().remove(sku);
    }

    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, _locale: Option<&str>, sku: &str, url_key: &str) -> Result<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.renders.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(sku) {
            return Err(AppError::render(sku, "template error"));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(sku)
            .cloned()
            .unwrap_or_else(|| format!("<html>{url_key}/{sku}</html>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submitted<R> {
    pub locale: Option<String>,
    pub batch_number: usize,
    pub records: Vec<R>,
}

#[derive(Default)]
pub(crate) struct FakeAdmin {
    published: Mutex<Vec<Submitted<PublishRecord>>>,
    unpublished: Mutex<Vec<Submitted<UnpublishRecord>>>,
    rejected: Mutex<HashSet<String>>,
    unreachable: Mutex<bool>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeAdmin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records for this SKU are previewed but never published or unpublished.
    pub(crate) fn reject(&self, sku: &str) {
        self.rejected.lock().unwrap().insert(sku.into());
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn published(&self) -> Vec<Submitted<PublishRecord>> {
        self.published.lock().unwrap().clone()
    }

    pub(crate) fn published_skus(&self) -> Vec<String> {
        let mut skus: Vec<String> = self
            .published()
            .into_iter()
            .flat_map(|b| b.records.into_iter().map(|r| r.sku))
            .collect();
        skus.sort();
        skus
    }

    pub(crate) fn unpublished(&self) -> Vec<Submitted<UnpublishRecord>> {
        self.unpublished.lock().unwrap().clone()
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.unreachable.lock().unwrap() {
            Err(AppError::admin("fake", 503, "admin unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AdminApi for FakeAdmin {
    async fn start_processing(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_processing(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn preview_and_publish(
        &self,
        records: &[PublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult> {
        self.check_reachable()?;
        self.published.lock().unwrap().push(Submitted {
            locale: locale.map(String::from),
            batch_number,
            records: records.to_vec(),
        });

        let rejected = self.rejected.lock().unwrap();
        let now = Utc::now();
        let records = records
            .iter()
            .map(|r| {
                let mut out = BatchRecord::new(&r.sku, &r.path);
                out.rendered_at = r.rendered_at;
                out.previewed_at = Some(now);
                if !rejected.contains(&r.sku) {
                    out.published_at = Some(now);
                }
                out
            })
            .collect();
        Ok(BatchResult { records })
    }

    async fn unpublish_and_delete(
        &self,
        records: &[UnpublishRecord],
        locale: Option<&str>,
        batch_number: usize,
    ) -> Result<BatchResult> {
        self.check_reachable()?;
        self.unpublished.lock().unwrap().push(Submitted {
            locale: locale.map(String::from),
            batch_number,
            records: records.to_vec(),
        });

        let rejected = self.rejected.lock().unwrap();
        let now = Utc::now();
        let records = records
            .iter()
            .map(|r| {
                let mut out = BatchRecord::new(&r.sku, &r.path);
                out.live_unpublished_at = Some(now);
                if !rejected.contains(&r.sku) {
                    out.preview_unpublished_at = Some(now);
                }
                out
            })
            .collect();
        Ok(BatchResult { records })
    }

    fn preview_durations(&self) -> Vec<f64> {
        self.published()
            .iter()
            .flat_map(|b| b.records.iter().map(|_| 10.0))
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct FakeIndex {
    paths: Mutex<HashMap<Option<String>, PublishedPaths>>,
    failing: Mutex<bool>,
}

impl FakeIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, locale: Option<&str>, sku: &str, path: &str) {
        self.paths
            .lock()
            .unwrap()
            .entry(locale.map(String::from))
            .or_default()
            .insert(sku, path);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl PublishedIndex for FakeIndex {
    async fn published_paths(&self, locale: Option<&str>) -> Result<PublishedPaths> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::catalog("published-products-index", "HTTP 500"));
        }
        Ok(self
            .paths
            .lock()
            .unwrap()
            .get(&locale.map(String::from))
            .cloned()
            .unwrap_or_default())
    }
}

/// Fakes wired together the way a run sees them.
pub(crate) struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub renderer: Arc<FakeRenderer>,
    pub admin: Arc<FakeAdmin>,
    pub index: Arc<FakeIndex>,
    pub storage: Arc<MemoryStorage>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            catalog: Arc::new(FakeCatalog::new()),
            renderer: Arc::new(FakeRenderer::new()),
            admin: Arc::new(FakeAdmin::new()),
            index: Arc::new(FakeIndex::new()),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    pub(crate) fn services(&self) -> Services {
        Services {
            catalog: self.catalog.clone(),
            renderer: self.renderer.clone(),
            admin: self.admin.clone(),
            index: self.index.clone(),
            storage: self.storage.clone(),
        }
    }
}
