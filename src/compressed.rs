//! Compressed view over any [`KeyValueStore`].
//!
//! Values pass through the [`Pipeline`] on the way in and out; keys are
//! namespaced with the configured prefix. A missing key is `Ok(None)`; a
//! present key that fails to decode is an error.

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::config::CompressionConfig;
use crate::engine::{CompressionEngine, FlateEngine};
use crate::error::Result;
use crate::pipeline::{CompressionResult, Pipeline};
use crate::store::KeyValueStore;
use crate::value::Value;

/// A key-value store that compresses values transparently.
pub struct CompressedStore<S, E = FlateEngine> {
    store: S,
    pipeline: Pipeline<E>,
}

impl<S: KeyValueStore> CompressedStore<S, FlateEngine> {
    /// Wrap `store` using the default `flate2` engine.
    pub fn new(store: S, config: CompressionConfig) -> Self {
        Self::with_engine(store, FlateEngine::new(), config)
    }
}

impl<S: KeyValueStore, E: CompressionEngine> CompressedStore<S, E> {
    pub fn with_engine(store: S, engine: E, config: CompressionConfig) -> Self {
        Self {
            store,
            pipeline: Pipeline::new(engine, config),
        }
    }

    /// The underlying store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn pipeline(&self) -> &Pipeline<E> {
        &self.pipeline
    }

    pub fn config(&self) -> &CompressionConfig {
        self.pipeline.config()
    }

    /// Whether values at or above the threshold can be written and read.
    pub fn is_supported(&self) -> bool {
        self.pipeline.is_supported()
    }

    /// The key actually used in the underlying store.
    pub fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config().prefix, key)
    }

    /// Compress and store `value` under `key`.
    ///
    /// Returns the compression result so callers can inspect sizes.
    pub async fn set_item(&self, key: &str, value: &Value) -> Result<CompressionResult> {
        let result = self.pipeline.compress(value).await?;
        self.store.set(&self.full_key(key), result.data.clone()).await?;
        Ok(result)
    }

    /// Read and decompress the value under `key`.
    pub async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let full_key = self.full_key(key);
        let Some(stored) = self.store.get(&full_key).await? else {
            return Ok(None);
        };

        match self.pipeline.decompress(&stored).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                if e.is_corrupt_record() {
                    warn!(key = %full_key, error = %e, "stored record could not be decoded");
                }
                Err(e.into())
            }
        }
    }

    /// Store any `Serialize` value.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<CompressionResult> {
        let value = Value::from_serialize(value)?;
        self.set_item(key, &value).await
    }

    /// Read a value and deserialize it into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key).await? {
            Some(value) => Ok(Some(value.deserialize_into()?)),
            None => Ok(None),
        }
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        self.store.remove(&self.full_key(key)).await
    }

    /// Check if `key` exists, without decoding it.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.full_key(key)).await
    }
}
