//! In-memory key-value store with a fixed byte quota.
//!
//! Models a browser's persistent storage: string keys and values, a hard
//! capacity, and a `StorageFull` error when a write would exceed it.
//!
//! This implementation is NOT durable - data is lost on process exit.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::store::{validate_key, KeyValueStore};

/// Default capacity: 5 MiB.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, String>,
    used: usize,
}

/// In-memory implementation of KeyValueStore.
///
/// Usage is counted as the UTF-8 length of every key plus its value.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    quota: usize,
}

impl MemoryStore {
    /// Create an empty store with the default 5 MiB quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    /// Create an empty store holding at most `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            quota,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.inner.read().used
    }

    /// Get the number of entries in the store.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.used = 0;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.inner.read().data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        validate_key(key)?;

        let mut inner = self.inner.write();
        let released = inner
            .data
            .get(key)
            .map(|old| key.len() + old.len())
            .unwrap_or(0);
        let needed = inner.used - released + key.len() + value.len();

        if needed > self.quota {
            return Err(StoreError::StorageFull(format!(
                "writing {} bytes to {:?} needs {} of {} bytes",
                value.len(),
                key,
                needed,
                self.quota
            )));
        }

        inner.data.insert(key.to_string(), value);
        inner.used = needed;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let mut inner = self.inner.write();
        if let Some(old) = inner.data.remove(key) {
            inner.used -= key.len() + old.len();
        }
        Ok(())
    }
}
