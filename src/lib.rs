//! # compact-store
//!
//! Transparent compression for string-only key-value stores.
//!
//! Values are serialized to JSON; anything at or above a size threshold is
//! compressed (gzip or deflate), base64-encoded and tagged with a one-character
//! marker, so more logical data fits into a store with a fixed capacity.
//!
//! - **Format** ([`format`]): `R` raw JSON, `G` gzip, `D` deflate
//! - **Pipeline** ([`Pipeline`]): threshold policy, framing, decoding
//! - **Engines** ([`CompressionEngine`]): pluggable compressors
//! - **Stores** ([`KeyValueStore`]): host backends wrapped by [`CompressedStore`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use compact_store::{CompressedStore, CompressionConfig, MemoryStore, Value};
//!
//! #[tokio::main]
//! async fn main() -> compact_store::Result<()> {
//!     let store = CompressedStore::new(MemoryStore::new(), CompressionConfig::default());
//!
//!     let value = Value::object([("name", Value::from("test"))]);
//!     let result = store.set_item("user", &value).await?;
//!     println!("stored {} -> {} bytes", result.original_size, result.compressed_size);
//!
//!     if let Some(loaded) = store.get_item("user").await? {
//!         println!("{:?}", loaded.get("name"));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline Only
//!
//! ```rust,no_run
//! use compact_store::{Algorithm, CompressionConfig, Pipeline, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), compact_store::CompressError> {
//!     let config = CompressionConfig::builder()
//!         .threshold(64)
//!         .algorithm(Algorithm::Deflate)
//!         .build();
//!     let pipeline = Pipeline::with_config(config);
//!
//!     let value = Value::from("hello ".repeat(100));
//!     let result = pipeline.compress(&value).await?;
//!     assert!(result.data.starts_with('D'));
//!
//!     let back = pipeline.decompress(&result.data).await?;
//!     assert_eq!(back, value);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod compressed;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod memory;
pub mod pipeline;
pub mod sqlite;
pub mod store;
pub mod value;

// Re-export main types
pub use compressed::CompressedStore;
pub use config::{CompressionConfig, CompressionOptions};
pub use engine::{CompressionEngine, FlateEngine, UnsupportedEngine};
pub use error::{CompressError, ConfigError, Result, StoreError};
pub use format::{Algorithm, Marker, Record};
pub use memory::MemoryStore;
pub use pipeline::{CompressionResult, Pipeline};
pub use sqlite::SqliteStore;
pub use store::{KeyValueStore, MAX_KEY_LENGTH};
pub use value::Value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::compressed::CompressedStore;
    pub use crate::config::CompressionConfig;
    pub use crate::engine::{CompressionEngine, FlateEngine};
    pub use crate::error::{CompressError, Result, StoreError};
    pub use crate::format::Algorithm;
    pub use crate::memory::MemoryStore;
    pub use crate::pipeline::{CompressionResult, Pipeline};
    pub use crate::store::KeyValueStore;
    pub use crate::value::Value;
}
