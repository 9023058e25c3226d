//! Per-locale reconciliation state and its snapshot codec.
//!
//! A snapshot is one line per SKU:
//!
//! ```text
//! <sku>,<lastPreviewedAt epoch millis>,<content hash>
//! ```
//!
//! The hash column is empty for SKUs that were discovered but never rendered.
//! SKUs may contain commas; the last two columns never do, so lines are split
//! from the right. SKUs with line breaks cannot be stored.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};

/// What the state remembers about one SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuState {
    pub last_previewed_at: DateTime<Utc>,
    pub content_hash: Option<String>,
}

impl SkuState {
    /// Entry for a SKU that has never been rendered.
    pub fn discovered() -> Self {
        Self {
            last_previewed_at: DateTime::UNIX_EPOCH,
            content_hash: None,
        }
    }

    pub fn published(at: DateTime<Utc>, content_hash: impl Into<String>) -> Self {
        Self {
            last_previewed_at: at,
            content_hash: Some(content_hash.into()),
        }
    }
}

/// State of one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleState {
    pub locale: Option<String>,
    pub skus: BTreeMap<String, SkuState>,
}

impl LocaleState {
    pub fn empty(locale: Option<&str>) -> Self {
        Self {
            locale: locale.map(String::from),
            skus: BTreeMap::new(),
        }
    }

    /// Storage key component for this locale.
    pub fn key(&self) -> &str {
        state_key(self.locale.as_deref())
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }

    /// Number of SKUs that have been rendered at least once.
    pub fn rendered_count(&self) -> usize {
        self.skus.values().filter(|s| s.content_hash.is_some()).count()
    }

    /// Serialize to the snapshot format.
    ///
    /// Entries whose SKU cannot be stored are left out.
    pub fn encode(&self) -> String {
        self.skus
            .iter()
            .filter(|(sku, _)| {
                let storable = is_storable_sku(sku);
                if !storable {
                    log::warn!("Leaving unstorable SKU {:?} out of the snapshot", sku);
                }
                storable
            })
            .map(|(sku, entry)| {
                format!(
                    "{},{},{}",
                    sku,
                    entry.last_previewed_at.timestamp_millis(),
                    entry.content_hash.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a snapshot.
    ///
    /// Returns `None` if any non-blank line is malformed; callers treat that as
    /// an empty state.
    pub fn decode(locale: Option<&str>, data: &str) -> Option<Self> {
        let mut state = Self::empty(locale);
        for line in data.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.rsplitn(3, ',');
            let (sku, millis, hash) = match (fields.next(), fields.next(), fields.next()) {
                (Some(hash), Some(millis), Some(sku)) => (sku, millis, Some(hash)),
                // Lines without a hash column
                (Some(millis), Some(sku), None) => (sku, millis, None),
                _ => return None,
            };
            if sku.is_empty() {
                return None;
            }
            let millis: i64 = millis.trim().parse().ok()?;
            let last_previewed_at = Utc.timestamp_millis_opt(millis).single()?;
            let content_hash = hash
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from);
            state.skus.insert(
                sku.to_string(),
                SkuState {
                    last_previewed_at,
                    content_hash,
                },
            );
        }
        Some(state)
    }
}

/// Whether a SKU can be kept in a snapshot.
pub fn is_storable_sku(sku: &str) -> bool {
    !sku.is_empty() && !sku.contains(['\n', '\r'])
}

/// Storage key component for a locale; the unnamed locale maps to `default`.
pub fn state_key(locale: Option<&str>) -> &str {
    locale.unwrap_or("default")
}
