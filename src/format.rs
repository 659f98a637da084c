//! Storage format: a one-character marker followed by the payload.
//!
//! | Marker | Payload                                   |
//! |--------|-------------------------------------------|
//! | `R`    | JSON text, verbatim                       |
//! | `G`    | base64 of gzip-compressed JSON bytes      |
//! | `D`    | base64 of zlib-wrapped deflate JSON bytes |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CompressError;

/// Compression algorithm applied to payloads at or above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Gzip,
    Deflate,
}

impl Algorithm {
    /// The name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
        }
    }

    /// The marker that tags payloads compressed with this algorithm.
    pub fn marker(&self) -> Marker {
        match self {
            Algorithm::Gzip => Marker::Gzip,
            Algorithm::Deflate => Marker::Deflate,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Algorithm::Gzip),
            "deflate" => Ok(Algorithm::Deflate),
            other => Err(format!("unknown algorithm '{}', expected gzip or deflate", other)),
        }
    }
}

/// Leading character of every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Raw,
    Gzip,
    Deflate,
}

impl Marker {
    pub fn as_char(&self) -> char {
        match self {
            Marker::Raw => 'R',
            Marker::Gzip => 'G',
            Marker::Deflate => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(Marker::Raw),
            'G' => Some(Marker::Gzip),
            'D' => Some(Marker::Deflate),
            _ => None,
        }
    }

    /// Algorithm implied by this marker, `None` for raw records.
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            Marker::Raw => None,
            Marker::Gzip => Some(Algorithm::Gzip),
            Marker::Deflate => Some(Algorithm::Deflate),
        }
    }
}

/// A stored record split into its marker and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// Uncompressed JSON text.
    Raw(&'a str),
    /// Base64 text of a compressed JSON payload.
    Compressed {
        algorithm: Algorithm,
        payload: &'a str,
    },
}

impl<'a> Record<'a> {
    /// Split a stored string into marker and payload.
    ///
    /// Fails on an empty string or an unrecognized leading character.
    pub fn parse(text: &'a str) -> Result<Self, CompressError> {
        let mut chars = text.chars();
        let first = chars.next().ok_or_else(|| {
            CompressError::InvalidFormat("empty record has no marker".to_string())
        })?;
        let payload = chars.as_str();

        let marker = Marker::from_char(first).ok_or_else(|| {
            CompressError::InvalidFormat(format!(
                "unrecognized marker {:?}, expected one of R, G, D",
                first
            ))
        })?;

        Ok(match marker.algorithm() {
            None => Record::Raw(payload),
            Some(algorithm) => Record::Compressed { algorithm, payload },
        })
    }

    pub fn marker(&self) -> Marker {
        match self {
            Record::Raw(_) => Marker::Raw,
            Record::Compressed { algorithm, .. } => algorithm.marker(),
        }
    }

    pub fn payload(&self) -> &'a str {
        match *self {
            Record::Raw(payload) => payload,
            Record::Compressed { payload, .. } => payload,
        }
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.marker().as_char(), self.payload())
    }
}
