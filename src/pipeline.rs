//! The compress/decompress pipeline.
//!
//! ```text
//! compress:   value -> JSON -> size < threshold ? "R" + JSON
//!                                               : marker + base64(engine(JSON))
//! decompress: marker -> R: JSON
//!                       G/D: base64 -> engine -> UTF-8 -> JSON
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::codec;
use crate::config::CompressionConfig;
use crate::engine::{CompressionEngine, FlateEngine};
use crate::error::CompressError;
use crate::format::{Marker, Record};
use crate::value::Value;

/// Output of one [`Pipeline::compress`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    /// Tagged text to persist.
    pub data: String,
    /// UTF-8 length of the serialized value.
    pub original_size: usize,
    /// UTF-8 length of `data`, marker included.
    pub compressed_size: usize,
    /// Whether the engine was used.
    pub was_compressed: bool,
}

impl CompressionResult {
    pub fn marker(&self) -> Option<Marker> {
        self.data.chars().next().and_then(Marker::from_char)
    }
}

/// Frames values for a string-only store.
///
/// Holds only an engine and an immutable config, so one pipeline can serve
/// any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct Pipeline<E = FlateEngine> {
    engine: E,
    config: Arc<CompressionConfig>,
}

impl Pipeline<FlateEngine> {
    /// Pipeline backed by the default `flate2` engine.
    pub fn with_config(config: CompressionConfig) -> Self {
        Self::new(FlateEngine::new(), config)
    }
}

impl<E: CompressionEngine> Pipeline<E> {
    pub fn new(engine: E, config: CompressionConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Whether the engine can compress in this environment.
    pub fn is_supported(&self) -> bool {
        self.engine.is_supported()
    }

    fn require_engine(&self, action: &str) -> Result<(), CompressError> {
        if self.engine.is_supported() {
            Ok(())
        } else {
            Err(CompressError::UnsupportedEnvironment(format!(
                "{} requires a compression engine, none is available",
                action
            )))
        }
    }

    /// Encode `value` for storage.
    pub async fn compress(&self, value: &Value) -> Result<CompressionResult, CompressError> {
        let text = codec::serialize(value)?;
        let original_size = codec::utf8_byte_length(&text);

        if original_size < self.config.threshold {
            let data = Record::Raw(&text).to_string();
            let compressed_size = codec::utf8_byte_length(&data);
            debug!(original_size, threshold = self.config.threshold, "storing raw");
            return Ok(CompressionResult {
                data,
                original_size,
                compressed_size,
                was_compressed: false,
            });
        }

        let algorithm = self.config.algorithm;
        self.require_engine("compression")?;
        let bytes = self.engine.compress(algorithm, text.into_bytes()).await?;
        let payload = codec::encode_bytes_to_text(&bytes);
        let data = Record::Compressed {
            algorithm,
            payload: &payload,
        }
        .to_string();
        let compressed_size = codec::utf8_byte_length(&data);

        debug!(
            %algorithm,
            original_size,
            compressed_size,
            "compressed value"
        );
        Ok(CompressionResult {
            data,
            original_size,
            compressed_size,
            was_compressed: true,
        })
    }

    /// Decode a stored record back into a value.
    pub async fn decompress(&self, tagged: &str) -> Result<Value, CompressError> {
        match Record::parse(tagged)? {
            Record::Raw(text) => codec::deserialize(text),
            Record::Compressed { algorithm, payload } => {
                self.require_engine("decompression")?;
                let bytes = codec::decode_text_to_bytes(payload)?;
                let inflated = self.engine.decompress(algorithm, bytes).await?;
                let text = String::from_utf8(inflated).map_err(|e| {
                    CompressError::Codec(format!(
                        "{} payload is not valid UTF-8: {}",
                        algorithm, e
                    ))
                })?;
                debug!(%algorithm, stored_size = tagged.len(), "decompressed value");
                codec::deserialize(&text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::UnsupportedEngine;
    use crate::format::Algorithm;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(threshold: usize, algorithm: Algorithm) -> CompressionConfig {
        CompressionConfig::builder()
            .threshold(threshold)
            .algorithm(algorithm)
            .build()
    }

    fn pipeline(threshold: usize, algorithm: Algorithm) -> Pipeline {
        Pipeline::with_config(config(threshold, algorithm))
    }

    fn large_repetitive() -> Value {
        Value::object([(
            "items",
            Value::array((0..200).map(|i| {
                Value::object([
                    ("id", Value::from(i as i64)),
                    ("status", Value::from("active")),
                    ("description", Value::from("the same description every time")),
                ])
            })),
        )])
    }

    /// Records every engine call; compresses by identity.
    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompressionEngine for CountingEngine {
        fn is_supported(&self) -> bool {
            true
        }

        async fn compress(&self, _: Algorithm, input: Vec<u8>) -> Result<Vec<u8>, CompressError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }

        async fn decompress(&self, _: Algorithm, input: Vec<u8>) -> Result<Vec<u8>, CompressError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    /// Fails mid-stream on every call.
    struct FailingEngine;

    #[async_trait]
    impl CompressionEngine for FailingEngine {
        fn is_supported(&self) -> bool {
            true
        }

        async fn compress(&self, _: Algorithm, _: Vec<u8>) -> Result<Vec<u8>, CompressError> {
            Err(CompressError::Codec("engine exploded".to_string()))
        }

        async fn decompress(&self, _: Algorithm, _: Vec<u8>) -> Result<Vec<u8>, CompressError> {
            Err(CompressError::Codec("engine exploded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_small_value_stored_raw() {
        let value = Value::object([("name", Value::from("test"))]);
        let result = pipeline(500, Algorithm::Gzip).compress(&value).await.unwrap();

        assert_eq!(result.data, r#"R{"name":"test"}"#);
        assert!(!result.was_compressed);
        assert_eq!(result.original_size, 15);
        assert_eq!(result.compressed_size, 16);
        assert_eq!(result.marker(), Some(Marker::Raw));
    }

    #[tokio::test]
    async fn test_large_value_gzip() {
        let value = large_repetitive();
        let result = pipeline(100, Algorithm::Gzip).compress(&value).await.unwrap();

        assert!(result.data.starts_with('G'));
        assert!(result.was_compressed);
        assert!(result.compressed_size < result.original_size);
        assert_eq!(result.compressed_size, result.data.len());
    }

    #[tokio::test]
    async fn test_large_value_deflate() {
        let value = large_repetitive();
        let p = pipeline(100, Algorithm::Deflate);
        let result = p.compress(&value).await.unwrap();

        assert_eq!(result.marker(), Some(Marker::Deflate));
        assert_eq!(p.decompress(&result.data).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_round_trip_all_configs() {
        let values = vec![
            Value::Null,
            Value::from(true),
            Value::from(-17i64),
            Value::from(3.25),
            Value::from(""),
            Value::array(Vec::new()),
            Value::object([("nested", Value::object([("k", Value::array([Value::Null]))]))]),
            large_repetitive(),
        ];

        for threshold in [0, 1, 50, 100, 1_000_000] {
            for algorithm in [Algorithm::Gzip, Algorithm::Deflate] {
                let p = pipeline(threshold, algorithm);
                for value in &values {
                    let result = p.compress(value).await.unwrap();
                    let back = p.decompress(&result.data).await.unwrap();
                    assert_eq!(&back, value, "threshold={} algorithm={}", threshold, algorithm);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_hard_floats_round_trip() {
        let floats = [
            1.0715660391465826e-75,
            0.1,
            -0.30000000000000004,
            5e-324,
            2.2250738585072014e-308,
            1.7976931348623157e308,
            123456789.12345679,
            9007199254740993.0,
        ];
        let value = Value::array(floats.iter().map(|&x| Value::from(x)));

        for threshold in [0, usize::MAX] {
            let p = pipeline(threshold, Algorithm::Gzip);
            for &x in &floats {
                let single = Value::from(x);
                let result = p.compress(&single).await.unwrap();
                assert_eq!(p.decompress(&result.data).await.unwrap(), single, "{}", x);
            }
            let result = p.compress(&value).await.unwrap();
            assert_eq!(p.decompress(&result.data).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_too_deep_value_fails_compress() {
        let mut value = Value::from("leaf");
        for _ in 0..200 {
            value = Value::array([value]);
        }

        let p = Pipeline::new(CountingEngine::default(), config(0, Algorithm::Gzip));
        let err = p.compress(&value).await.unwrap_err();
        assert!(matches!(err, CompressError::Serialization(_)));
        assert_eq!(p.engine().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        // 98 characters plus two quotes: exactly 100 bytes serialized
        let value = Value::from("a".repeat(98));

        let at = pipeline(100, Algorithm::Gzip).compress(&value).await.unwrap();
        assert_eq!(at.original_size, 100);
        assert!(at.was_compressed);

        let above = pipeline(101, Algorithm::Gzip).compress(&value).await.unwrap();
        assert!(!above.was_compressed);
    }

    #[tokio::test]
    async fn test_threshold_counts_utf8_bytes() {
        // 2 characters, 8 bytes with quotes
        let value = Value::from("日本");
        let result = pipeline(8, Algorithm::Gzip).compress(&value).await.unwrap();
        assert_eq!(result.original_size, 8);
        assert!(result.was_compressed);
    }

    #[tokio::test]
    async fn test_marker_matches_compression() {
        let small = Value::from("x");
        let big = large_repetitive();

        for algorithm in [Algorithm::Gzip, Algorithm::Deflate] {
            let p = pipeline(100, algorithm);
            for value in [&small, &big] {
                let result = p.compress(value).await.unwrap();
                let expected = if result.was_compressed {
                    algorithm.marker()
                } else {
                    Marker::Raw
                };
                assert_eq!(result.marker(), Some(expected));
            }
        }
    }

    #[tokio::test]
    async fn test_raw_path_independent_of_algorithm() {
        let value = large_repetitive();
        let text = codec::serialize(&value).unwrap();

        for algorithm in [Algorithm::Gzip, Algorithm::Deflate] {
            let p = Pipeline::new(UnsupportedEngine, config(usize::MAX, algorithm));
            let result = p.compress(&value).await.unwrap();
            assert_eq!(result.data, format!("R{}", text));
        }
    }

    #[tokio::test]
    async fn test_cycle_fails_compress() {
        let obj = Value::object([("a", Value::from(1i64))]);
        let child = Value::array([obj.clone()]);
        obj.insert("child", child);

        let engine = CountingEngine::default();
        let p = Pipeline::new(engine, config(0, Algorithm::Gzip));
        let err = p.compress(&obj).await.unwrap_err();
        assert!(matches!(err, CompressError::Serialization(_)));
        assert_eq!(p.engine().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unicode_round_trip() {
        let text = "Hello, 世界! Привет мир! 🌍🚀 ¿Qué tal? مرحبا ∑∞≠";
        let value = Value::object([("text", Value::from(text.repeat(10)))]);

        for algorithm in [Algorithm::Gzip, Algorithm::Deflate] {
            let p = pipeline(10, algorithm);
            let result = p.compress(&value).await.unwrap();
            assert!(result.was_compressed);
            let back = p.decompress(&result.data).await.unwrap();
            assert_eq!(back.get("text").unwrap().as_str(), Some(text.repeat(10).as_str()));
        }
    }

    #[tokio::test]
    async fn test_decompress_invalid_format_without_engine() {
        let p = Pipeline::new(UnsupportedEngine, CompressionConfig::default());

        let err = p.decompress("").await.unwrap_err();
        assert!(matches!(err, CompressError::InvalidFormat(_)));

        let err = p.decompress("Xinvalid").await.unwrap_err();
        assert!(matches!(err, CompressError::InvalidFormat(_)));
        assert!(err.to_string().contains("unrecognized marker"));
    }

    #[tokio::test]
    async fn test_raw_records_need_no_engine() {
        let p = Pipeline::new(UnsupportedEngine, CompressionConfig::default());
        assert!(!p.is_supported());

        let value = Value::object([("name", Value::from("test"))]);
        let result = p.compress(&value).await.unwrap();
        assert_eq!(p.decompress(&result.data).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_unsupported_environment() {
        let p = Pipeline::new(UnsupportedEngine, config(0, Algorithm::Gzip));

        let err = p.compress(&Value::from("x")).await.unwrap_err();
        assert!(matches!(err, CompressError::UnsupportedEnvironment(_)));

        let err = p.decompress("GH4sIAAAAAAAAA").await.unwrap_err();
        assert!(matches!(err, CompressError::UnsupportedEnvironment(_)));
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let p = Pipeline::new(FailingEngine, config(0, Algorithm::Deflate));

        let err = p.compress(&Value::from("x")).await.unwrap_err();
        assert!(err.to_string().contains("engine exploded"));

        let err = p.decompress("DAAAA").await.unwrap_err();
        assert!(matches!(err, CompressError::Codec(_)));
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let p = pipeline(0, Algorithm::Gzip);

        // Not base64
        let err = p.decompress("G***").await.unwrap_err();
        assert!(matches!(err, CompressError::Codec(_)));

        // Valid base64, not gzip
        let err = p.decompress(&format!("G{}", codec::encode_bytes_to_text(b"plain"))).await;
        assert!(matches!(err, Err(CompressError::Codec(_))));

        // Gzip bytes under the deflate marker
        let gz = p.compress(&large_repetitive()).await.unwrap();
        let swapped = format!("D{}", &gz.data[1..]);
        assert!(matches!(p.decompress(&swapped).await, Err(CompressError::Codec(_))));

        // Raw record with broken JSON
        let err = p.decompress("R{\"a\":").await.unwrap_err();
        assert!(matches!(err, CompressError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_non_utf8_payload() {
        let p = Pipeline::new(CountingEngine::default(), CompressionConfig::default());
        let record = format!("G{}", codec::encode_bytes_to_text(&[0xff, 0xfe, 0x00]));
        let err = p.decompress(&record).await.unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[tokio::test]
    async fn test_fake_engine_framing() {
        let p = Pipeline::new(CountingEngine::default(), config(0, Algorithm::Deflate));
        let result = p.compress(&Value::from("hi")).await.unwrap();

        // identity engine: payload is base64 of the JSON text
        assert_eq!(result.data, format!("D{}", codec::encode_bytes_to_text(b"\"hi\"")));
        assert_eq!(p.decompress(&result.data).await.unwrap(), Value::from("hi"));
        assert_eq!(p.engine().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_share_pipeline() {
        let p = Arc::new(pipeline(10, Algorithm::Gzip));
        let mut handles = Vec::new();

        for i in 0..16i64 {
            let p = Arc::clone(&p);
            handles.push(tokio::spawn(async move {
                let value = Value::object([
                    ("n", Value::from(i)),
                    ("pad", Value::from("z".repeat(200))),
                ]);
                let result = p.compress(&value).await.unwrap();
                let back = p.decompress(&result.data).await.unwrap();
                assert_eq!(back, value);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
