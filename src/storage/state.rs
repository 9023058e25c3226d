//! Durable per-locale state snapshots.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{LocaleState, state_key};
use crate::storage::BlobStore;

const STATE_FILE_EXT: &str = "csv";

/// Loads and persists [`LocaleState`] snapshots in a blob store.
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn BlobStore>,
    prefix: String,
}

impl StateStore {
    pub fn new(store: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Key of the snapshot for a locale.
    pub fn location(&self, locale: Option<&str>) -> String {
        format!(
            "{}/{}.{}",
            self.prefix.trim_end_matches('/'),
            state_key(locale),
            STATE_FILE_EXT
        )
    }

    /// Load the snapshot for a locale.
    ///
    /// Never fails: a missing, unreadable or malformed snapshot yields an
    /// empty state, which at worst causes redundant renders.
    pub async fn load(&self, locale: Option<&str>) -> LocaleState {
        let key = self.location(locale);
        let bytes = match self.store.read(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::info!("No state snapshot at {}, starting empty", key);
                return LocaleState::empty(locale);
            }
            Err(e) => {
                log::warn!("Failed to read state snapshot {}: {}. Starting empty.", key, e);
                return LocaleState::empty(locale);
            }
        };

        let decoded = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| LocaleState::decode(locale, text));
        match decoded {
            Some(state) => {
                log::debug!("Loaded {} SKUs from {}", state.len(), key);
                state
            }
            None => {
                log::warn!("State snapshot {} is malformed, starting empty", key);
                LocaleState::empty(locale)
            }
        }
    }

    /// Overwrite the snapshot for the state's locale.
    pub async fn save(&self, state: &LocaleState) -> Result<()> {
        let key = self.location(state.locale.as_deref());
        self.store.write(&key, state.encode().as_bytes()).await?;
        log::debug!("Saved {} SKUs to {}", state.len(), key);
        Ok(())
    }

    /// Remove the snapshot for a locale.
    pub async fn delete(&self, locale: Option<&str>) -> Result<()> {
        let key = self.location(locale);
        self.store.delete(&key).await?;
        log::info!("Deleted state snapshot {}", key);
        Ok(())
    }
}
