//! Bedrock game protocol: batch framing, compression and the typed packet
//! codec.

pub mod batch;
pub mod compression;
pub mod id;
pub mod packets;
pub mod types;

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors raised by the game protocol codec.
#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("unexpected end of buffer")]
    UnexpectedEof,
    #[error("varint is too long")]
    VarIntTooLong,
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("length prefix {len} runs past the end of the buffer")]
    LengthOutOfBounds { len: usize },
    #[error("batch payload does not start with 0xFE")]
    MissingBatchHeader,
    #[error("zlib inflate failed: {0}")]
    Inflate(std::io::Error),
    #[error("zlib deflate failed: {0}")]
    Deflate(std::io::Error),
    #[error("invalid enum value {value} for {what}")]
    InvalidEnum { what: &'static str, value: u64 },
}

/// Serialize a value into the Bedrock game wire format.
pub trait ProtoEncode {
    fn proto_encode(&self, dst: &mut impl BufMut);
}

/// Deserialize a value from the Bedrock game wire format.
pub trait ProtoDecode: Sized {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError>;
}
