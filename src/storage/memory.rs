//! In-memory blob store for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

#[derive(Default)]
pub(crate) struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes_matching: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every write whose key contains `pattern` fail.
    pub(crate) fn fail_writes_matching(&self, pattern: &str) {
        *self.fail_writes_matching.lock().unwrap() = Some(pattern.to_string());
    }

    pub(crate) fn get_string(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub(crate) fn put(&self, key: &str, bytes: &[u8]) {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    /// Keys written so far, in order, including repeats.
    pub(crate) fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if let Some(pattern) = self.fail_writes_matching.lock().unwrap().as_deref() {
            if key.contains(pattern) {
                return Err(AppError::storage(key, "injected write failure"));
            }
        }
        self.writes.lock().unwrap().push(key.to_string());
        self.put(key, bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}
