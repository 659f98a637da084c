//! KeyValueStore trait - the host store the compressed layer writes into.
//!
//! The store maps string keys to string values, like a browser's
//! persistent storage. It has a fixed capacity; writes that would exceed it
//! fail with [`StoreError::StorageFull`].

use async_trait::async_trait;

use crate::error::{Result, StoreError};

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Validate that a key is well-formed.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// A string-only key-value store.
///
/// Backends (SQLite, memory) implement this trait; the compressed wrapper
/// depends on the trait, not on a backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove a key.
    ///
    /// Returns `Ok(())` if the key was removed or didn't exist.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
