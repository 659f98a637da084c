//! Compression engines.
//!
//! The pipeline never compresses bytes itself; it hands them to a
//! [`CompressionEngine`]. [`FlateEngine`] is the production engine built on
//! `flate2`. [`UnsupportedEngine`] stands in for an environment that has no
//! compression capability.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::{self, Read, Write};
use tokio::runtime::Handle;

use crate::error::CompressError;
use crate::format::Algorithm;

/// Bytes fed to the encoder per write call.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A byte-stream compressor/decompressor selectable by algorithm.
#[async_trait]
pub trait CompressionEngine: Send + Sync {
    /// Whether this engine can run in the current environment.
    fn is_supported(&self) -> bool;

    /// Compress `input` in full.
    async fn compress(&self, algorithm: Algorithm, input: Vec<u8>) -> Result<Vec<u8>, CompressError>;

    /// Decompress `input` in full.
    async fn decompress(
        &self,
        algorithm: Algorithm,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, CompressError>;
}

/// gzip and zlib-wrapped deflate via `flate2`.
///
/// Work runs on tokio's blocking pool, so the engine is supported whenever a
/// tokio runtime is reachable from the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct FlateEngine {
    level: Compression,
}

impl FlateEngine {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Use compression level `level` (0-9, clamped).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for FlateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(algorithm: Algorithm, level: Compression, input: &[u8]) -> io::Result<Vec<u8>> {
    match algorithm {
        Algorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            for chunk in input.chunks(STREAM_CHUNK_SIZE) {
                encoder.write_all(chunk)?;
            }
            encoder.finish()
        }
        Algorithm::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            for chunk in input.chunks(STREAM_CHUNK_SIZE) {
                encoder.write_all(chunk)?;
            }
            encoder.finish()
        }
    }
}

fn decode(algorithm: Algorithm, input: &[u8]) -> io::Result<Vec<u8>> {
    match algorithm {
        Algorithm::Gzip => {
            // A truncated member fails while reading the trailer.
            let mut out = Vec::new();
            GzDecoder::new(input).read_to_end(&mut out)?;
            Ok(out)
        }
        Algorithm::Deflate => inflate_zlib(input),
    }
}

/// Inflate a zlib stream, failing unless the stream end is reached.
fn inflate_zlib(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(input.len().saturating_mul(4).max(64));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }
        let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
        let consumed = in_before as usize;

        let status = inflater
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let stalled =
                    inflater.total_in() == in_before && inflater.total_out() == out_before;
                if stalled && out.len() < out.capacity() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "deflate stream ended before its final block",
                    ));
                }
            }
        }
    }
}

fn runtime() -> Result<Handle, CompressError> {
    Handle::try_current().map_err(|e| {
        CompressError::UnsupportedEnvironment(format!("no tokio runtime available: {}", e))
    })
}

#[async_trait]
impl CompressionEngine for FlateEngine {
    fn is_supported(&self) -> bool {
        Handle::try_current().is_ok()
    }

    async fn compress(&self, algorithm: Algorithm, input: Vec<u8>) -> Result<Vec<u8>, CompressError> {
        let level = self.level;
        runtime()?
            .spawn_blocking(move || encode(algorithm, level, &input))
            .await
            .map_err(|e| CompressError::Codec(format!("{} compression task failed: {}", algorithm, e)))?
            .map_err(|e| CompressError::Codec(format!("{} compression failed: {}", algorithm, e)))
    }

    async fn decompress(
        &self,
        algorithm: Algorithm,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, CompressError> {
        runtime()?
            .spawn_blocking(move || decode(algorithm, &input))
            .await
            .map_err(|e| {
                CompressError::Codec(format!("{} decompression task failed: {}", algorithm, e))
            })?
            .map_err(|e| CompressError::Codec(format!("{} decompression failed: {}", algorithm, e)))
    }
}

/// An engine for environments without compression support.
///
/// Reports `is_supported() == false` and fails every call. Raw records still
/// round-trip through a pipeline built on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedEngine;

#[async_trait]
impl CompressionEngine for UnsupportedEngine {
    fn is_supported(&self) -> bool {
        false
    }

    async fn compress(&self, algorithm: Algorithm, _input: Vec<u8>) -> Result<Vec<u8>, CompressError> {
        Err(CompressError::UnsupportedEnvironment(format!(
            "{} compression is not available",
            algorithm
        )))
    }

    async fn decompress(
        &self,
        algorithm: Algorithm,
        _input: Vec<u8>,
    ) -> Result<Vec<u8>, CompressError> {
        Err(CompressError::UnsupportedEnvironment(format!(
            "{} decompression is not available",
            algorithm
        )))
    }
}
