//! Catalog items and reconciliation candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product as listed by the catalog's full SKU listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRef {
    pub sku: String,
    #[serde(rename = "urlKey", default)]
    pub url_key: Option<String>,
}

impl ProductRef {
    pub fn new(sku: impl Into<String>, url_key: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            url_key: Some(url_key.into()),
        }
    }
}

/// A product with its catalog modification time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub sku: String,

    /// URL slug; may be missing for products without a storefront page
    #[serde(rename = "urlKey", default)]
    pub url_key: Option<String>,

    /// `None` when the catalog sent no usable timestamp
    #[serde(rename = "lastModifiedAt", default, deserialize_with = "timestamp::deserialize")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl CatalogItem {
    pub fn new(sku: impl Into<String>, url_key: impl Into<String>, last_modified_at: DateTime<Utc>) -> Self {
        Self {
            sku: sku.into(),
            url_key: Some(url_key.into()),
            last_modified_at: Some(last_modified_at),
        }
    }
}

/// Catalog timestamps arrive as RFC 3339 strings, naive date-times or epoch
/// millis. Anything else, including `null`, reads as `None`.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(parse(&Value::deserialize(deserializer)?))
    }

    fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
            Value::String(text) => {
                let text = text.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                    return Some(dt.with_timezone(&Utc));
                }
                NAIVE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                    .map(|naive| naive.and_utc())
            }
            _ => None,
        }
    }
}

/// A catalog item enriched with what the state remembers about it.
///
/// Lives for one run only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub sku: String,
    pub url_key: Option<String>,
    /// Lowercased product page path
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub last_preview: DateTime<Utc>,
    pub current_hash: Option<String>,
    pub rendered_at: Option<DateTime<Utc>>,
    pub new_hash: Option<String>,
}

impl Candidate {
    /// Whether the rendered content differs from what was last published.
    pub fn content_changed(&self) -> bool {
        match &self.new_hash {
            Some(new_hash) => self.current_hash.as_deref() != Some(new_hash.as_str()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn candidate(current: Option<&str>, new: Option<&str>) -> Candidate {
        Candidate {
            sku: "A".into(),
            url_key: Some("a".into()),
            path: "/products/a/a".into(),
            last_modified: Utc.timestamp_millis_opt(100).unwrap(),
            last_preview: DateTime::UNIX_EPOCH,
            current_hash: current.map(String::from),
            rendered_at: None,
            new_hash: new.map(String::from),
        }
    }

    #[test]
    fn test_content_changed() {
        assert!(candidate(None, Some("h1")).content_changed());
        assert!(candidate(Some("h0"), Some("h1")).content_changed());
        assert!(!candidate(Some("h1"), Some("h1")).content_changed());
        assert!(!candidate(Some("h1"), None).content_changed());
        assert!(!candidate(None, None).content_changed());
    }

    #[test]
    fn test_catalog_item_deserialize() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"sku":"sku-1","urlKey":"red-shirt","lastModifiedAt":"2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(item.url_key.as_deref(), Some("red-shirt"));
        assert_eq!(item.last_modified_at.map(|t| t.timestamp()), Some(1740823200));

        let bare: CatalogItem =
            serde_json::from_str(r#"{"sku":"sku-2","lastModifiedAt":"2025-03-01T10:00:00Z"}"#).unwrap();
        assert!(bare.url_key.is_none());

        let millis: CatalogItem =
            serde_json::from_str(r#"{"sku":"sku-3","urlKey":"x","lastModifiedAt":1740823200000}"#).unwrap();
        assert_eq!(millis.last_modified_at, item.last_modified_at);

        let naive: CatalogItem =
            serde_json::from_str(r#"{"sku":"sku-4","lastModifiedAt":"2025-03-01 10:00:00"}"#).unwrap();
        assert_eq!(naive.last_modified_at, item.last_modified_at);
    }

    #[test]
    fn test_catalog_item_without_usable_timestamp() {
        let items: Vec<CatalogItem> = serde_json::from_str(
            r#"[
                {"sku":"A","urlKey":"a","lastModifiedAt":"2025-03-01T10:00:00Z"},
                {"sku":"B","urlKey":"b","lastModifiedAt":null},
                {"sku":"C","urlKey":"c","lastModifiedAt":"yesterday"},
                {"sku":"D","urlKey":"d"}
            ]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 4);
        assert!(items[0].last_modified_at.is_some());
        assert!(items[1..].iter().all(|i| i.last_modified_at.is_none()));
    }
}
