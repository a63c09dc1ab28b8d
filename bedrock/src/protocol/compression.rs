//! Per-batch compression as negotiated by `NetworkSettings`.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::protocol::ProtoError;

/// Algorithm byte carried after the `0xFE` batch header once compression is
/// negotiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    #[default]
    Zlib,
    Snappy,
    None,
}

impl CompressionAlgorithm {
    /// Algorithm id as carried in the `NetworkSettings` packet.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(CompressionAlgorithm::Zlib),
            0x0001 => Some(CompressionAlgorithm::Snappy),
            0xFFFF => Some(CompressionAlgorithm::None),
            _ => None,
        }
    }

    /// The per-batch marker byte.
    pub fn byte(self) -> u8 {
        match self {
            CompressionAlgorithm::Zlib => 0x00,
            CompressionAlgorithm::Snappy => 0x01,
            CompressionAlgorithm::None => 0xFF,
        }
    }

    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(CompressionAlgorithm::Zlib),
            0x01 => Some(CompressionAlgorithm::Snappy),
            0xFF => Some(CompressionAlgorithm::None),
            _ => None,
        }
    }
}

/// Compress a batch body with the given algorithm.
///
/// Snappy is declared by the protocol but never negotiated by this client;
/// it is passed through unchanged, like an unknown algorithm.
pub fn compress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>, ProtoError> {
    match algorithm {
        CompressionAlgorithm::Zlib => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(ProtoError::Deflate)?;
            encoder.finish().map_err(ProtoError::Deflate)
        }
        CompressionAlgorithm::Snappy | CompressionAlgorithm::None => Ok(data.to_vec()),
    }
}

/// Inverse of [`compress`]. Unknown algorithm bytes are treated as raw.
pub fn decompress(data: Bytes, algorithm: Option<CompressionAlgorithm>) -> Result<Bytes, ProtoError> {
    match algorithm {
        Some(CompressionAlgorithm::Zlib) => {
            let mut decoder = DeflateDecoder::new(&data[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(ProtoError::Inflate)?;
            Ok(Bytes::from(out))
        }
        Some(CompressionAlgorithm::Snappy) => {
            tracing::debug!("snappy batch treated as raw payload");
            Ok(data)
        }
        Some(CompressionAlgorithm::None) | None => Ok(data),
    }
}
