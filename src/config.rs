//! Compression settings.
//!
//! Build a [`CompressionConfig`] with `CompressionConfig::builder().foo(...).build()`,
//! or resolve partial [`CompressionOptions`] (from serde or the environment).

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::ConfigError;
use crate::format::Algorithm;

/// Serialized size (bytes) below which values are stored raw.
pub const DEFAULT_THRESHOLD: usize = 100;

/// Key namespace applied by the storage wrapper.
pub const DEFAULT_PREFIX: &str = "compact:";

pub const ENV_THRESHOLD: &str = "COMPACT_STORE_THRESHOLD";
pub const ENV_ALGORITHM: &str = "COMPACT_STORE_ALGORITHM";
pub const ENV_PREFIX: &str = "COMPACT_STORE_PREFIX";

/// Resolved compression settings. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionConfig {
    /// Values whose serialized UTF-8 length is below this are stored raw.
    pub threshold: usize,

    /// Algorithm used at or above the threshold.
    pub algorithm: Algorithm,

    /// Prefix prepended to every key by the storage wrapper.
    pub prefix: String,
}

impl CompressionConfig {
    /// Start building a config with defaults:
    ///
    /// - threshold = 100 bytes
    /// - algorithm = gzip
    /// - prefix    = "compact:"
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder {
            threshold: DEFAULT_THRESHOLD,
            algorithm: Algorithm::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Fluent builder for `CompressionConfig`.
#[derive(Clone, Debug)]
pub struct CompressionConfigBuilder {
    threshold: usize,
    algorithm: Algorithm,
    prefix: String,
}

impl CompressionConfigBuilder {
    pub fn threshold(mut self, bytes: usize) -> Self {
        self.threshold = bytes;
        self
    }
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn build(self) -> CompressionConfig {
        CompressionConfig {
            threshold: self.threshold,
            algorithm: self.algorithm,
            prefix: self.prefix,
        }
    }
}

/// Partial settings; unset fields take defaults on [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionOptions {
    pub threshold: Option<usize>,
    pub algorithm: Option<Algorithm>,
    pub prefix: Option<String>,
}

impl CompressionOptions {
    /// Read options from `COMPACT_STORE_*` environment variables.
    ///
    /// Unset variables leave the field unset; unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let threshold = lookup(ENV_THRESHOLD)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                    key: ENV_THRESHOLD.to_string(),
                    reason: format!("{:?}: {}", raw, e),
                })
            })
            .transpose()?;

        let algorithm = lookup(ENV_ALGORITHM)
            .map(|raw| {
                raw.parse::<Algorithm>()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: ENV_ALGORITHM.to_string(),
                        reason,
                    })
            })
            .transpose()?;

        Ok(Self {
            threshold,
            algorithm,
            prefix: lookup(ENV_PREFIX),
        })
    }

    /// Fields set in `other` override fields set in `self`.
    pub fn merge(self, other: CompressionOptions) -> Self {
        Self {
            threshold: other.threshold.or(self.threshold),
            algorithm: other.algorithm.or(self.algorithm),
            prefix: other.prefix.or(self.prefix),
        }
    }

    /// Fill unset fields with defaults.
    pub fn resolve(self) -> CompressionConfig {
        let mut builder = CompressionConfig::builder();
        if let Some(threshold) = self.threshold {
            builder = builder.threshold(threshold);
        }
        if let Some(algorithm) = self.algorithm {
            builder = builder.algorithm(algorithm);
        }
        if let Some(prefix) = self.prefix {
            builder = builder.prefix(prefix);
        }
        builder.build()
    }
}
