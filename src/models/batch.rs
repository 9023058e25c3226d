//! Records exchanged with the content admin API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page to preview and publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishRecord {
    pub sku: String,
    pub path: String,
    #[serde(rename = "renderedAt", default)]
    pub rendered_at: Option<DateTime<Utc>>,
}

/// A page to unpublish and delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnpublishRecord {
    pub sku: String,
    pub path: String,
}

/// Per-item outcome reported by the admin API.
///
/// Each lifecycle step reports the time it completed; a missing timestamp
/// means the step did not complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub sku: String,
    pub path: String,
    #[serde(default)]
    pub rendered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub live_unpublished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preview_unpublished_at: Option<DateTime<Utc>>,
}

impl BatchRecord {
    pub fn new(sku: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Both preview and publish completed.
    pub fn is_published(&self) -> bool {
        self.previewed_at.is_some() && self.published_at.is_some()
    }

    /// Both the live and the preview copy were removed.
    pub fn is_unpublished(&self) -> bool {
        self.live_unpublished_at.is_some() && self.preview_unpublished_at.is_some()
    }
}

/// Result of one submitted batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResult {
    pub records: Vec<BatchRecord>,
}
