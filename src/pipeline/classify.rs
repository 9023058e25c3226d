//! Change classification.
//!
//! Splits a catalog snapshot into render candidates, delete candidates and
//! ignored items by comparing it with the locale state.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use crate::models::{Candidate, CatalogItem, LocaleState, ProductRef, SkuState, is_storable_sku};
use crate::utils::product_path;

/// URL keys we can build a page path from.
static URL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("valid url key pattern"));

/// Outcome of classifying one locale.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Items to render, in catalog order
    pub render: Vec<Candidate>,
    /// SKUs tracked in state that the catalog no longer reports
    pub deleted: Vec<String>,
    /// Items skipped this run
    pub ignored: usize,
}

impl Classification {
    pub fn has_work(&self) -> bool {
        !self.render.is_empty() || !self.deleted.is_empty()
    }
}

/// Whether a candidate needs a (re)render.
///
/// Equal timestamps count as modified.
pub fn should_render(candidate: &Candidate) -> bool {
    candidate
        .url_key
        .as_deref()
        .is_some_and(|key| URL_KEY.is_match(key))
        && candidate.last_modified >= candidate.last_preview
}

/// Classifier for one locale.
#[derive(Debug, Clone)]
pub struct ChangeClassifier<'a> {
    path_format: &'a str,
    locale: Option<&'a str>,
}

impl<'a> ChangeClassifier<'a> {
    pub fn new(path_format: &'a str, locale: Option<&'a str>) -> Self {
        Self {
            path_format,
            locale,
        }
    }

    /// Add products the state has never seen. Returns how many were added.
    ///
    /// SKUs a snapshot cannot hold are skipped.
    pub fn discover(&self, state: &mut LocaleState, products: &[ProductRef]) -> usize {
        let mut added = 0;
        for product in products {
            if !is_storable_sku(&product.sku) {
                log::warn!("Skipping product with unstorable SKU {:?}", product.sku);
                continue;
            }
            if !state.skus.contains_key(&product.sku) {
                state.skus.insert(product.sku.clone(), SkuState::discovered());
                added += 1;
            }
        }
        added
    }

    /// Enrich a catalog item with what the state remembers about it.
    ///
    /// Returns `None` if the item carries no modification time.
    pub fn candidate(&self, state: &LocaleState, item: &CatalogItem) -> Option<Candidate> {
        let last_modified = item.last_modified_at?;
        let entry = state.skus.get(&item.sku);
        let url_key = item.url_key.as_deref().unwrap_or_default();
        Some(Candidate {
            sku: item.sku.clone(),
            url_key: item.url_key.clone(),
            path: product_path(self.path_format, url_key, &item.sku, self.locale),
            last_modified,
            last_preview: entry.map_or(DateTime::UNIX_EPOCH, |e| e.last_previewed_at),
            current_hash: entry.and_then(|e| e.content_hash.clone()),
            rendered_at: None,
            new_hash: None,
        })
    }

    /// Classify catalog items against the state.
    ///
    /// Catalog SKUs missing from the state are added as newly discovered.
    /// Every tracked SKU the catalog did not report becomes a delete
    /// candidate. Items without a modification time or with an unstorable
    /// SKU are ignored.
    pub fn classify(&self, state: &mut LocaleState, items: &[CatalogItem]) -> Classification {
        let mut known: BTreeSet<String> = state.skus.keys().cloned().collect();
        let mut result = Classification::default();

        for item in items {
            if !is_storable_sku(&item.sku) {
                result.ignored += 1;
                continue;
            }
            if !known.remove(&item.sku) {
                state
                    .skus
                    .entry(item.sku.clone())
                    .or_insert_with(SkuState::discovered);
            }

            match self.candidate(state, item) {
                Some(candidate) if should_render(&candidate) => result.render.push(candidate),
                Some(_) => result.ignored += 1,
                None => {
                    log::warn!("Ignoring {} without a usable lastModifiedAt", item.sku);
                    result.ignored += 1;
                }
            }
        }

        result.deleted = known.into_iter().collect();
        result
    }
}
