//! Compression abstraction using trait-based design.
//!
//! Stored payloads may be compressed with zstd, lz4 or snappy. Datasets pick
//! the algorithm by name in their configuration.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Compression algorithm types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Zstd compression, best ratio.
    Zstd,
    /// LZ4 compression, fastest.
    Lz4,
    /// Snappy framed compression.
    Snappy,
}

impl CompressionAlgorithm {
    /// Get the default compression level for this algorithm.
    pub fn default_level(&self) -> i32 {
        match self {
            CompressionAlgorithm::Zstd => 3,
            CompressionAlgorithm::Lz4 | CompressionAlgorithm::Snappy => 0,
        }
    }

    /// Name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Snappy => "snappy",
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            other => Err(CommonError::configuration_error(format!(
                "Unknown compression algorithm '{}', expected one of zstd, lz4, snappy",
                other
            ))),
        }
    }
}

/// Generic compressor interface.
pub trait Compressor: Debug + Send + Sync {
    /// Compress the input data and return compressed bytes.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data and return original bytes.
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Get the compression algorithm used by this compressor.
    fn algorithm(&self) -> CompressionAlgorithm;
}

/// Builder for creating compressor instances.
#[derive(Debug, Clone)]
pub struct CompressionBuilder {
    algorithm: CompressionAlgorithm,
    level: i32,
}

impl CompressionBuilder {
    /// Create a new compression builder with the specified algorithm.
    pub fn with_algorithm(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            level: algorithm.default_level(),
        }
    }

    /// Set the compression level. Ignored by algorithms without levels.
    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Build a compressor instance.
    pub fn build(self) -> Result<Box<dyn Compressor>> {
        match self.algorithm {
            CompressionAlgorithm::Zstd => {
                if !(1..=22).contains(&self.level) {
                    return Err(CommonError::configuration_error(format!(
                        "Invalid zstd compression level: {}. Must be between 1 and 22",
                        self.level
                    )));
                }
                Ok(Box::new(ZstdCompressor { level: self.level }))
            }
            CompressionAlgorithm::Lz4 => Ok(Box::new(Lz4Compressor)),
            CompressionAlgorithm::Snappy => Ok(Box::new(SnappyCompressor)),
        }
    }
}

#[derive(Debug)]
struct ZstdCompressor {
    level: i32,
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
            .map_err(|e| CommonError::compression_error_with_source("zstd", e))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(compressed_data)
            .map_err(|e| CommonError::decompression_error_with_source("zstd", e))
    }

    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }
}

#[derive(Debug)]
struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(compressed_data)
            .map_err(|e| CommonError::decompression_error_with_source("lz4", e))
    }

    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }
}

#[derive(Debug)]
struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = snap::write::FrameEncoder::new(Vec::new());
        encoder
            .write_all(data)
            .map_err(|e| CommonError::compression_error_with_source("snappy", e))?;
        encoder
            .into_inner()
            .map_err(|e| CommonError::compression_error(format!("snappy: {}", e)))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = snap::read::FrameDecoder::new(compressed_data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CommonError::decompression_error_with_source("snappy", e))?;
        Ok(decompressed)
    }

    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Snappy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"{\"col1\": [1, 2, 3], \"col2\": [4, 5, 6], \"col3\": [5, 6, 7]}";

    #[test]
    fn test_every_algorithm_restores_payload() {
        for algorithm in [
            CompressionAlgorithm::Zstd,
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Snappy,
        ] {
            let compressor = CompressionBuilder::with_algorithm(algorithm)
                .build()
                .expect("compressor");
            assert_eq!(compressor.algorithm(), algorithm);
            let compressed = compressor.compress(PAYLOAD).expect("compress");
            let restored = compressor.decompress(&compressed).expect("decompress");
            assert_eq!(restored, PAYLOAD, "{} lost data", algorithm.as_str());
        }
    }

    #[test]
    fn test_invalid_zstd_level() {
        let result = CompressionBuilder::with_algorithm(CompressionAlgorithm::Zstd)
            .level(40)
            .build();
        assert!(matches!(result, Err(CommonError::ConfigurationError { .. })));
    }

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!(
            "ZSTD".parse::<CompressionAlgorithm>().expect("zstd"),
            CompressionAlgorithm::Zstd
        );
        assert!("gzip".parse::<CompressionAlgorithm>().is_err());
    }

    #[test]
    fn test_corrupted_input_is_reported() {
        let compressor = CompressionBuilder::with_algorithm(CompressionAlgorithm::Lz4)
            .build()
            .expect("compressor");
        let err = compressor.decompress(b"\x01").expect_err("garbage");
        assert!(matches!(err, CommonError::DecompressionError { .. }));
    }
}
