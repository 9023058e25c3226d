//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::is_valid_url;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site identity and content locations
    #[serde(default)]
    pub site: SiteConfig,

    /// Commerce catalog service settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Product page renderer settings
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Content admin API settings
    #[serde(default)]
    pub admin: AdminConfig,

    /// Reconciliation knobs
    #[serde(default)]
    pub poller: PollerConfig,

    /// Blob store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored, numeric values that fail to parse are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ORG") {
            self.site.org = v;
        }
        if let Some(v) = get("SITE") {
            self.site.site = v;
        }
        if let Some(v) = get("STORE_URL") {
            self.site.store_url = v;
        }
        if let Some(v) = get("CONTENT_URL") {
            self.site.content_url = v;
        }
        if let Some(v) = get("PRODUCT_PAGE_URL_FORMAT") {
            self.site.product_page_url_format = v;
        }
        if let Some(v) = get("LOCALES") {
            self.site.locales = parse_locales(&v);
        }
        if let Some(v) = get("AEM_ADMIN_AUTH_TOKEN") {
            self.admin.auth_token = v;
        }
        if let Some(v) = get("CATALOG_ENDPOINT") {
            self.catalog.endpoint = v;
        }
        if let Some(v) = get("CATALOG_API_KEY") {
            self.catalog.api_key = v;
        }
        if let Some(v) = get("RENDERER_ENDPOINT") {
            self.renderer.endpoint = v;
        }
        if let Some(n) = get("BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.poller.batch_size = n;
        }
        if let Some(n) = get("RENDER_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.poller.render_concurrency = n;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Check that every parameter a run needs is present and well-formed.
    ///
    /// All missing parameters are reported at once.
    pub fn check_params(&self) -> Result<()> {
        let required = [
            ("ORG", &self.site.org),
            ("SITE", &self.site.site),
            ("PRODUCT_PAGE_URL_FORMAT", &self.site.product_page_url_format),
            ("AEM_ADMIN_AUTH_TOKEN", &self.admin.auth_token),
            ("CONTENT_URL", &self.site.content_url),
            ("STORE_URL", &self.site.store_url),
            ("CATALOG_ENDPOINT", &self.catalog.endpoint),
            ("RENDERER_ENDPOINT", &self.renderer.endpoint),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::config(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )));
        }

        if !is_valid_url(&self.site.store_url) {
            return Err(AppError::config("Invalid storeUrl"));
        }
        if !is_valid_url(&self.site.content_url) {
            return Err(AppError::config("Invalid contentUrl"));
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.poller.batch_size) {
            return Err(AppError::validation(format!(
                "poller.batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if self.poller.render_concurrency == 0 {
            return Err(AppError::validation(
                "poller.render_concurrency must be > 0",
            ));
        }
        if self.poller.lock_ttl_secs == 0 {
            return Err(AppError::validation("poller.lock_ttl_secs must be > 0"));
        }
        if self.admin.max_concurrent == 0 {
            return Err(AppError::validation("admin.max_concurrent must be > 0"));
        }
        if self.catalog.page_size == 0 || self.catalog.sku_chunk_size == 0 {
            return Err(AppError::validation(
                "catalog.page_size and catalog.sku_chunk_size must be > 0",
            ));
        }
        if !self.site.product_page_url_format.contains("{sku}")
            && !self.site.product_page_url_format.contains("{urlKey}")
        {
            return Err(AppError::validation(
                "site.product_page_url_format must contain {sku} or {urlKey}",
            ));
        }
        Ok(())
    }

    /// Locales to reconcile. `None` stands for the single default locale.
    pub fn run_locales(&self) -> Vec<Option<String>> {
        if self.site.locales.is_empty() {
            vec![None]
        } else {
            self.site.locales.iter().cloned().map(Some).collect()
        }
    }
}

/// Split a comma-separated locale list, dropping blanks.
pub fn parse_locales(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Site identity and content locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Organization owning the site
    #[serde(default)]
    pub org: String,

    /// Site name (repo or repoless)
    #[serde(default)]
    pub site: String,

    /// Edge delivery URL of the site content
    #[serde(default)]
    pub content_url: String,

    /// Public facing URL of the store
    #[serde(default)]
    pub store_url: String,

    /// Path format for product pages, e.g. `/{locale}/products/{urlKey}/{sku}`
    #[serde(default = "defaults::product_page_url_format")]
    pub product_page_url_format: String,

    /// Locales (or store codes) to reconcile; empty means the default locale
    #[serde(default)]
    pub locales: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            site: String::new(),
            content_url: String::new(),
            store_url: String::new(),
            product_page_url_format: defaults::product_page_url_format(),
            locales: Vec::new(),
        }
    }
}

/// Commerce catalog service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// GraphQL endpoint of the catalog service
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub environment_id: String,

    #[serde(default)]
    pub website_code: String,

    #[serde(default)]
    pub store_code: String,

    #[serde(default)]
    pub store_view_code: String,

    #[serde(default)]
    pub customer_group: String,

    /// Store view code per locale; locales not listed use `store_view_code`
    #[serde(default)]
    pub locale_store_views: BTreeMap<String, String>,

    /// Products per search page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Upper bound on search pages fetched per run
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// SKUs per last-modified query
    #[serde(default = "defaults::sku_chunk_size")]
    pub sku_chunk_size: usize,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl CatalogConfig {
    /// Store view code to query for a locale.
    pub fn store_view_for(&self, locale: Option<&str>) -> &str {
        locale
            .and_then(|l| self.locale_store_views.get(l))
            .map(String::as_str)
            .unwrap_or(&self.store_view_code)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            environment_id: String::new(),
            website_code: String::new(),
            store_code: String::new(),
            store_view_code: String::new(),
            customer_group: String::new(),
            locale_store_views: BTreeMap::new(),
            page_size: defaults::page_size(),
            max_pages: defaults::max_pages(),
            sku_chunk_size: defaults::sku_chunk_size(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Product page renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Base URL of the rendering service
    #[serde(default)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Content admin API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "defaults::admin_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub auth_token: String,

    #[serde(default = "defaults::branch")]
    pub branch: String,

    /// Maximum admin requests in flight
    #[serde(default = "defaults::admin_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries after the first attempt for retryable failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::admin_base_url(),
            auth_token: String::new(),
            branch: defaults::branch(),
            max_concurrent: defaults::admin_max_concurrent(),
            max_retries: defaults::max_retries(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Largest batch the admin API accepts.
pub const MAX_BATCH_SIZE: usize = 50;

/// Reconciliation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Records per admin batch, at most [`MAX_BATCH_SIZE`]
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Renders in flight across all locales
    #[serde(default = "defaults::render_concurrency")]
    pub render_concurrency: usize,

    /// Lifetime of the run lease in seconds
    #[serde(default = "defaults::lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Key prefix for state snapshots and the run lease
    #[serde(default = "defaults::state_prefix")]
    pub state_prefix: String,

    /// Key prefix for rendered page artifacts
    #[serde(default = "defaults::artifact_prefix")]
    pub artifact_prefix: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            render_concurrency: defaults::render_concurrency(),
            lock_ttl_secs: defaults::lock_ttl(),
            state_prefix: defaults::state_prefix(),
            artifact_prefix: defaults::artifact_prefix(),
        }
    }
}

/// Which blob store backs state and artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

/// Blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::storage_root")]
    pub root: String,

    /// Bucket for the S3 backend
    #[serde(default)]
    pub bucket: String,

    /// Key prefix for the S3 backend
    #[serde(default)]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: defaults::storage_root(),
            bucket: String::new(),
            prefix: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Site defaults
    pub fn product_page_url_format() -> String {
        "/products/{urlKey}/{sku}".into()
    }

    // Catalog defaults
    pub fn page_size() -> usize {
        500
    }
    pub fn max_pages() -> usize {
        20
    }
    pub fn sku_chunk_size() -> usize {
        100
    }
    pub fn timeout() -> u64 {
        60
    }

    // Admin defaults
    pub fn admin_base_url() -> String {
        "https://admin.hlx.page".into()
    }
    pub fn branch() -> String {
        "main".into()
    }
    pub fn admin_max_concurrent() -> usize {
        5
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        500
    }

    // Poller defaults
    pub fn batch_size() -> usize {
        50
    }
    pub fn render_concurrency() -> usize {
        50
    }
    pub fn lock_ttl() -> u64 {
        3600
    }
    pub fn state_prefix() -> String {
        "check-product-changes".into()
    }
    pub fn artifact_prefix() -> String {
        "public/pdps".into()
    }

    // Storage defaults
    pub fn storage_root() -> String {
        "storage".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn complete_config() -> Config {
        let mut config = Config::default();
        config.site.org = "acme".into();
        config.site.site = "store".into();
        config.site.content_url = "https://main--store--acme.aem.live".into();
        config.site.store_url = "https://store.example.com".into();
        config.admin.auth_token = "token".into();
        config.catalog.endpoint = "https://catalog.example.com/graphql".into();
        config.renderer.endpoint = "https://render.example.com".into();
        config
    }

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.poller.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_caps_batch_size() {
        let mut config = Config::default();
        config.poller.batch_size = MAX_BATCH_SIZE;
        assert!(config.validate().is_ok());

        config.apply_overrides(|key| (key == "BATCH_SIZE").then(|| "100".to_string()));
        assert_eq!(config.poller.batch_size, 100);
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("between 1 and 50"));
    }

    #[test]
    fn check_params_accepts_complete_config() {
        assert!(complete_config().check_params().is_ok());
    }

    #[test]
    fn check_params_lists_all_missing() {
        let mut config = complete_config();
        config.site.org.clear();
        config.admin.auth_token = "  ".into();

        let err = config.check_params().unwrap_err();
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required parameters: ORG, AEM_ADMIN_AUTH_TOKEN"
        );
    }

    #[test]
    fn check_params_rejects_invalid_store_url() {
        let mut config = complete_config();
        config.site.store_url = "invalid-url".into();

        let err = config.check_params().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Invalid storeUrl");
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ORG", "acme"),
            ("LOCALES", "en, fr,,de"),
            ("BATCH_SIZE", "25"),
            ("RENDER_CONCURRENCY", "many"),
            ("SITE", ""),
        ]);
        let mut config = Config::default();
        config.site.site = "kept".into();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.site.org, "acme");
        assert_eq!(config.site.site, "kept");
        assert_eq!(config.site.locales, vec!["en", "fr", "de"]);
        assert_eq!(config.poller.batch_size, 25);
        assert_eq!(config.poller.render_concurrency, 50);
    }

    #[test]
    fn run_locales_defaults_to_single_unnamed_locale() {
        let mut config = Config::default();
        assert_eq!(config.run_locales(), vec![None]);

        config.site.locales = vec!["en".into(), "fr".into()];
        assert_eq!(
            config.run_locales(),
            vec![Some("en".to_string()), Some("fr".to_string())]
        );
    }

    #[test]
    fn store_view_falls_back_to_default() {
        let config = Config::from_toml(
            r#"
            [catalog]
            store_view_code = "default"
            locale_store_views = { fr = "fr_store" }
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.store_view_for(Some("fr")), "fr_store");
        assert_eq!(config.catalog.store_view_for(Some("en")), "default");
        assert_eq!(config.catalog.store_view_for(None), "default");
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [site]
            org = "acme"
            locales = ["en"]

            [poller]
            batch_size = 10

            [storage]
            backend = "s3"
            bucket = "pages"
            "#,
        )
        .unwrap();

        assert_eq!(config.site.org, "acme");
        assert_eq!(config.site.product_page_url_format, "/products/{urlKey}/{sku}");
        assert_eq!(config.poller.batch_size, 10);
        assert_eq!(config.poller.render_concurrency, 50);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.admin.base_url, "https://admin.hlx.page");
    }
}
