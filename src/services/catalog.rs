//! Commerce catalog service client.
//!
//! Talks GraphQL to the catalog service. The full listing pages through
//! `productSearch`; modification times come from `products(skus)` queried in
//! chunks.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, CatalogItem, ProductRef};
use crate::services::CatalogClient;
use crate::utils::http::create_async_client;

/// Chunks of the last-modified query in flight at once.
const CHUNK_CONCURRENCY: usize = 4;

const ALL_SKUS_QUERY: &str = r#"
query getAllSkusPaginated($currentPage: Int!, $pageSize: Int!) {
  productSearch(phrase: "", page_size: $pageSize, current_page: $currentPage) {
    items {
      productView {
        urlKey
        sku
      }
    }
    page_info {
      total_pages
    }
  }
}
"#;

const LAST_MODIFIED_QUERY: &str = r#"
query getLastModified($skus: [String]!) {
  products(skus: $skus) {
    sku
    urlKey
    lastModifiedAt
  }
}
"#;

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(rename = "productSearch")]
    product_search: SearchPage,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(rename = "productView")]
    product_view: ProductRef,
}

#[derive(Deserialize)]
struct PageInfo {
    total_pages: usize,
}

#[derive(Debug, Deserialize)]
struct ProductsData {
    #[serde(default)]
    products: Vec<CatalogItem>,
}

/// GraphQL client for the commerce catalog service.
pub struct CommerceCatalog {
    client: Client,
    config: CatalogConfig,
    store_url: String,
}

impl CommerceCatalog {
    pub fn new(config: &CatalogConfig, store_url: &str) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config.timeout_secs)?,
            config: config.clone(),
            store_url: store_url.to_string(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        locale: Option<&str>,
    ) -> Result<T> {
        let body = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("origin", &self.store_url)
            .header("magento-customer-group", &self.config.customer_group)
            .header("magento-environment-id", &self.config.environment_id)
            .header("magento-store-code", &self.config.store_code)
            .header("magento-store-view-code", self.config.store_view_for(locale))
            .header("magento-website-code", &self.config.website_code)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::catalog(operation, format!("HTTP {}: {}", status, text)));
        }

        let parsed: GraphQlResponse<T> = response.json().await?;
        decode_response(operation, parsed)
    }

    async fn search_page(&self, locale: Option<&str>, page: usize) -> Result<SearchPage> {
        let data: SearchData = self
            .query(
                "getAllSkusPaginated",
                ALL_SKUS_QUERY,
                json!({ "currentPage": page, "pageSize": self.config.page_size }),
                locale,
            )
            .await?;
        Ok(data.product_search)
    }
}

fn decode_response<T>(operation: &str, response: GraphQlResponse<T>) -> Result<T> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(AppError::catalog(operation, messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| AppError::catalog(operation, "response carried no data"))
}

#[async_trait]
impl CatalogClient for CommerceCatalog {
    async fn fetch_all_skus(&self, locale: Option<&str>) -> Result<Vec<ProductRef>> {
        let first = self.search_page(locale, 1).await?;
        let mut total_pages = first.page_info.as_ref().map_or(1, |p| p.total_pages.max(1));
        if total_pages > self.config.max_pages {
            log::warn!(
                "Catalog lists {} pages of {} products, only the first {} are fetched",
                total_pages,
                self.config.page_size,
                self.config.max_pages
            );
            total_pages = self.config.max_pages;
        }

        let mut products: Vec<ProductRef> =
            first.items.into_iter().map(|i| i.product_view).collect();

        let mut pages = stream::iter(2..=total_pages)
            .map(|page| async move { (page, self.search_page(locale, page).await) })
            .buffered(CHUNK_CONCURRENCY);

        while let Some((page, result)) = pages.next().await {
            let page_items = result.map_err(|e| {
                AppError::catalog("getAllSkusPaginated", format!("page {}: {}", page, e))
            })?;
            products.extend(page_items.items.into_iter().map(|i| i.product_view));
        }

        log::info!(
            "Fetched {} products over {} pages for locale {}",
            products.len(),
            total_pages,
            locale.unwrap_or("default")
        );
        Ok(products)
    }

    async fn fetch_last_modified(
        &self,
        locale: Option<&str>,
        skus: &[String],
    ) -> Result<Vec<CatalogItem>> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = self.config.sku_chunk_size.max(1);
        let batches: Vec<Value> = skus
            .chunks(chunk_size)
            .map(|chunk| json!({ "skus": chunk }))
            .collect();
        let mut chunks = stream::iter(batches)
            .map(|variables| async move {
                self.query::<ProductsData>(
                    "getLastModified",
                    LAST_MODIFIED_QUERY,
                    variables,
                    locale,
                )
                .await
            })
            .buffered(CHUNK_CONCURRENCY);

        let mut items = Vec::with_capacity(skus.len());
        while let Some(result) = chunks.next().await {
            items.extend(result?.products);
        }

        log::info!(
            "Fetched last modified date for {} skus, total {}",
            items.len(),
            skus.len()
        );
        Ok(items)
    }
}
