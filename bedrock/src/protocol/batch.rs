//! The `0xFE` game batch: length-prefixed sub-packets, optionally compressed
//! once the server has sent its `NetworkSettings`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::compression::{self, CompressionAlgorithm};
use crate::protocol::types::VarUInt32;
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

pub const BATCH_HEADER: u8 = 0xFE;

/// Sub-client bits ride above the low 10 bits of the packet ID varint.
const PACKET_ID_MASK: u32 = 0x3FF;

/// Compression state of a session's batch stream. Starts disabled; enabled
/// exactly once, when `NetworkSettings` arrives, and never disabled again.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub compression_enabled: bool,
    pub algorithm: CompressionAlgorithm,
    pub threshold: usize,
}

impl BatchConfig {
    pub fn enable(&mut self, algorithm: CompressionAlgorithm, threshold: usize) {
        self.compression_enabled = true;
        self.algorithm = algorithm;
        self.threshold = threshold;
    }
}

/// Wrap already-serialized packets into one `0xFE` batch.
pub fn encode_batch(packets: &[Bytes], config: &BatchConfig) -> Result<Bytes, ProtoError> {
    let mut framed = BytesMut::new();
    for packet in packets {
        VarUInt32(packet.len() as u32).proto_encode(&mut framed);
        framed.put_slice(packet);
    }

    let mut out = BytesMut::with_capacity(framed.len() + 2);
    out.put_u8(BATCH_HEADER);

    if !config.compression_enabled {
        out.put_slice(&framed);
        return Ok(out.freeze());
    }

    if framed.len() > config.threshold && config.algorithm == CompressionAlgorithm::Zlib {
        out.put_u8(config.algorithm.byte());
        out.put_slice(&compression::compress(&framed, config.algorithm)?);
    } else {
        out.put_u8(CompressionAlgorithm::None.byte());
        out.put_slice(&framed);
    }
    Ok(out.freeze())
}

/// Convenience wrapper for the common single-packet batch.
pub fn encode_single(packet: Bytes, config: &BatchConfig) -> Result<Bytes, ProtoError> {
    encode_batch(&[packet], config)
}

/// Unwrap a `0xFE` batch into its sub-packet payloads.
pub fn decode_batch(mut payload: Bytes, config: &BatchConfig) -> Result<Vec<Bytes>, ProtoError> {
    if payload.first() != Some(&BATCH_HEADER) {
        return Err(ProtoError::MissingBatchHeader);
    }
    payload.advance(1);

    let body = if config.compression_enabled {
        if !payload.has_remaining() {
            return Err(ProtoError::UnexpectedEof);
        }
        let marker = payload.get_u8();
        let algorithm = CompressionAlgorithm::from_byte(marker);
        if algorithm.is_none() {
            tracing::debug!(marker, "unknown compression byte, treating batch as raw");
        }
        compression::decompress(payload, algorithm)?
    } else {
        payload
    };

    let mut cursor = body;
    let mut packets = Vec::new();
    while cursor.has_remaining() {
        let len = VarUInt32::proto_decode(&mut cursor)?.0 as usize;
        if cursor.remaining() < len {
            return Err(ProtoError::LengthOutOfBounds { len });
        }
        packets.push(cursor.copy_to_bytes(len));
    }
    Ok(packets)
}

/// Serialize one packet body with its varint ID header.
pub fn encode_sub_packet(id: u32, packet: &impl ProtoEncode) -> Bytes {
    let mut buf = BytesMut::new();
    VarUInt32(id).proto_encode(&mut buf);
    packet.proto_encode(&mut buf);
    buf.freeze()
}

/// Split a sub-packet into its numeric ID (low 10 bits of the first varint;
/// the upper bits carry sender/target sub-client markers) and body.
pub fn split_packet_header(mut payload: Bytes) -> Result<(u32, Bytes), ProtoError> {
    let header = VarUInt32::proto_decode(&mut payload)?.0;
    Ok((header & PACKET_ID_MASK, payload))
}

/// Decode a packet body captured by [`split_packet_header`].
pub fn decode_body<T: ProtoDecode>(body: &Bytes) -> Result<T, ProtoError> {
    let mut cursor = body.clone();
    let packet = T::proto_decode(&mut cursor)?;
    if cursor.has_remaining() {
        // Versions newer than the modelled one may append fields; tolerated.
        tracing::trace!(left = cursor.remaining(), "trailing bytes after packet body");
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed_config() -> BatchConfig {
        let mut config = BatchConfig::default();
        config.enable(CompressionAlgorithm::Zlib, 256);
        config
    }

    #[test]
    fn uncompressed_batch_has_no_algorithm_byte() {
        let config = BatchConfig::default();
        let batch = encode_batch(&[Bytes::from_static(b"\x01abc")], &config).unwrap();
        assert_eq!(batch[0], 0xFE);
        assert_eq!(batch[1], 4); // varint frame length, not an algorithm marker

        let packets = decode_batch(batch, &config).unwrap();
        assert_eq!(packets, vec![Bytes::from_static(b"\x01abc")]);
    }

    #[test]
    fn small_batches_carry_the_none_marker_once_enabled() {
        let config = compressed_config();
        let batch = encode_batch(&[Bytes::from_static(b"tiny")], &config).unwrap();
        assert_eq!(&batch[..2], &[0xFE, 0xFF]);
        let packets = decode_batch(batch, &config).unwrap();
        assert_eq!(packets, vec![Bytes::from_static(b"tiny")]);
    }

    #[test]
    fn large_batches_deflate_above_the_threshold() {
        let config = compressed_config();
        let payload = Bytes::from(vec![0x42u8; 600]);
        let batch = encode_batch(&[payload.clone()], &config).unwrap();
        assert_eq!(&batch[..2], &[0xFE, 0x00]);
        assert!(batch.len() < payload.len());

        let packets = decode_batch(batch, &config).unwrap();
        assert_eq!(packets, vec![payload]);
    }

    #[test]
    fn multiple_packets_roundtrip() {
        let config = compressed_config();
        let first = Bytes::from_static(b"one");
        let second = Bytes::from(vec![9u8; 400]);
        let batch = encode_batch(&[first.clone(), second.clone()], &config).unwrap();
        let packets = decode_batch(batch, &config).unwrap();
        assert_eq!(packets, vec![first, second]);
    }

    #[test]
    fn unknown_compression_marker_is_treated_as_raw() {
        let config = compressed_config();
        let mut raw = BytesMut::new();
        raw.put_u8(0xFE);
        raw.put_u8(0x7E); // bogus marker
        VarUInt32(3).proto_encode(&mut raw);
        raw.put_slice(b"abc");
        let packets = decode_batch(raw.freeze(), &config).unwrap();
        assert_eq!(packets, vec![Bytes::from_static(b"abc")]);
    }

    #[test]
    fn missing_header_is_rejected() {
        let config = BatchConfig::default();
        assert!(matches!(
            decode_batch(Bytes::from_static(b"\x01\x02"), &config),
            Err(ProtoError::MissingBatchHeader)
        ));
    }

    #[test]
    fn length_prefix_past_end_is_rejected() {
        let config = BatchConfig::default();
        let mut raw = BytesMut::new();
        raw.put_u8(0xFE);
        VarUInt32(200).proto_encode(&mut raw);
        raw.put_slice(b"short");
        assert!(matches!(
            decode_batch(raw.freeze(), &config),
            Err(ProtoError::LengthOutOfBounds { len: 200 })
        ));
    }

    #[test]
    fn packet_id_masks_sub_client_bits() {
        let mut buf = BytesMut::new();
        // ID 9 with sender sub-client 1 in bits 10..12.
        VarUInt32((1 << 10) | 9).proto_encode(&mut buf);
        buf.put_slice(b"body");
        let (id, body) = split_packet_header(buf.freeze()).unwrap();
        assert_eq!(id, 9);
        assert_eq!(&body[..], b"body");
    }
}
