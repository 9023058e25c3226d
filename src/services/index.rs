//! Published products index served as a JSON spreadsheet.
//!
//! The sheet lives at `{content_url}[/{locale}]/published-products-index.json`
//! and is paged with `offset`/`limit`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::services::{PublishedIndex, PublishedPaths};
use crate::utils::http::create_async_client;
use crate::utils::product_path;

const INDEX_SHEET: &str = "published-products-index";
const PAGE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct SheetPage {
    #[serde(default)]
    data: Vec<SheetRow>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    sku: String,
    #[serde(rename = "urlKey", default)]
    url_key: String,
}

/// Reads the published products index from the content site.
pub struct SpreadsheetIndex {
    client: Client,
    content_url: String,
    path_format: String,
}

impl SpreadsheetIndex {
    pub fn new(content_url: &str, path_format: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: create_async_client(timeout_secs)?,
            content_url: content_url.trim_end_matches('/').to_string(),
            path_format: path_format.to_string(),
        })
    }

    fn sheet_url(&self, locale: Option<&str>) -> String {
        match locale {
            Some(locale) => format!("{}/{}/{}.json", self.content_url, locale, INDEX_SHEET),
            None => format!("{}/{}.json", self.content_url, INDEX_SHEET),
        }
    }

    async fn fetch_page(&self, url: &str, offset: usize) -> Result<SheetPage> {
        let response = self
            .client
            .get(url)
            .query(&[("offset", offset), ("limit", PAGE_LIMIT)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::catalog(
                INDEX_SHEET,
                format!("HTTP {} from {}", status, url),
            ));
        }
        Ok(response.json().await?)
    }

    fn resolve(&self, rows: Vec<SheetRow>, locale: Option<&str>) -> PublishedPaths {
        rows.into_iter()
            .filter(|row| !row.sku.is_empty())
            .map(|row| {
                let path = product_path(&self.path_format, &row.url_key, &row.sku, locale);
                (row.sku, path)
            })
            .collect()
    }
}

#[async_trait]
impl PublishedIndex for SpreadsheetIndex {
    async fn published_paths(&self, locale: Option<&str>) -> Result<PublishedPaths> {
        let url = self.sheet_url(locale);
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(&url, offset).await?;
            let fetched = page.data.len();
            rows.extend(page.data);
            offset += fetched;

            let more = page.total.is_some_and(|total| offset < total);
            if fetched == 0 || !more {
                break;
            }
        }

        log::debug!("Published index {} lists {} products", url, rows.len());
        Ok(self.resolve(rows, locale))
    }
}
