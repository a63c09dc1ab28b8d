//! RakNet wire formats: frames, frame sets, ACK records and control packets.

pub mod ack;
pub mod constants;
pub mod frame;
pub mod packet;
pub mod reliability;
pub mod types;

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors that may occur while encoding RakNet protocol values or packets.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("reliable index missing for reliable frame")]
    MissingReliableIndex,
    #[error("sequence index missing for sequenced frame")]
    MissingSequenceIndex,
    #[error("order index missing for ordered/sequenced frame")]
    MissingOrderIndex,
}

/// Errors that may occur while decoding RakNet protocol values or packets.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("unexpected EoF, not enough bytes to read requested type")]
    UnexpectedEof,
    #[error("unknown packet id {0:#04x}")]
    UnknownId(u8),
    #[error("invalid magic value for offline packet")]
    InvalidMagic,
    #[error("invalid address version {0}, expected 4 or 6")]
    InvalidAddrVersion(u8),
    #[error("unknown reliability value {0}")]
    UnknownReliability(u8),
    #[error("invalid ack record")]
    InvalidAckRecord,
    #[error("datagram flag byte {0:#04x} is not a frame set, ack or nack")]
    InvalidDatagramHeader(u8),
    #[error("fragment metadata missing on a frame marked as fragmented")]
    MissingFragmentInfo,
    #[error("fragment index {index} out of range for fragment count {count}")]
    FragmentIndexOutOfRange { index: u32, count: u32 },
    #[error("fragment count mismatch for an in-flight reassembly")]
    FragmentCountMismatch,
}

/// Trait for types that know how to encode/decode themselves using the
/// RakNet wire format.
pub trait RaknetEncodable: Sized {
    /// Encode this value into the destination buffer.
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError>;

    /// Decode a value of this type from the source buffer.
    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError>;
}
