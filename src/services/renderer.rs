//! HTTP product page renderer.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::RendererConfig;
use crate::services::Renderer;
use crate::utils::http::create_async_client;

/// Fetches rendered pages from `{endpoint}/products/{urlKey}/{sku}`.
pub struct HttpRenderer {
    client: Client,
    endpoint: String,
}

impl HttpRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config.timeout_secs)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, sku: &str, url_key: &str) -> String {
        format!("{}/products/{}/{}", self.endpoint, url_key, sku)
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, locale: Option<&str>, sku: &str, url_key: &str) -> Result<String> {
        let mut request = self.client.get(self.page_url(sku, url_key));
        if let Some(locale) = locale {
            request = request.query(&[("locale", locale)]);
        }

        let response = request.send().await.map_err(|e| AppError::render(sku, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::render(sku, format!("HTTP {}", status)));
        }

        let html = response.text().await.map_err(|e| AppError::render(sku, e))?;
        if html.trim().is_empty() {
            return Err(AppError::render(sku, "empty page"));
        }
        Ok(html)
    }
}
