//! Primitive wire types of the Bedrock game protocol.
//!
//! Fixed-width integers are little-endian; most counters and identifiers are
//! LEB128 varints, signed flavours zig-zag encoded.

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// Unsigned 32-bit varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarUInt32(pub u32);

/// Signed 32-bit varint (zig-zag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt32(pub i32);

/// Unsigned 64-bit varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarUInt64(pub u64);

/// Signed 64-bit varint (zig-zag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt64(pub i64);

fn encode_varuint(mut value: u64, dst: &mut impl BufMut) {
    while value >= 0x80 {
        dst.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

fn decode_varuint(src: &mut impl Buf, max_bits: u32) -> Result<u64, ProtoError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        if shift >= max_bits {
            return Err(ProtoError::VarIntTooLong);
        }
        if !src.has_remaining() {
            return Err(ProtoError::UnexpectedEof);
        }
        let byte = src.get_u8();
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

impl ProtoEncode for VarUInt32 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        encode_varuint(self.0 as u64, dst);
    }
}

impl ProtoDecode for VarUInt32 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(VarUInt32(decode_varuint(src, 35)? as u32))
    }
}

impl ProtoEncode for VarUInt64 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        encode_varuint(self.0, dst);
    }
}

impl ProtoDecode for VarUInt64 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(VarUInt64(decode_varuint(src, 70)?))
    }
}

impl ProtoEncode for VarInt32 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        let zigzag = ((self.0 << 1) ^ (self.0 >> 31)) as u32;
        encode_varuint(zigzag as u64, dst);
    }
}

impl ProtoDecode for VarInt32 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let zigzag = decode_varuint(src, 35)? as u32;
        Ok(VarInt32(((zigzag >> 1) as i32) ^ -((zigzag & 1) as i32)))
    }
}

impl ProtoEncode for VarInt64 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        let zigzag = ((self.0 << 1) ^ (self.0 >> 63)) as u64;
        encode_varuint(zigzag, dst);
    }
}

impl ProtoDecode for VarInt64 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let zigzag = decode_varuint(src, 70)?;
        Ok(VarInt64(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64)))
    }
}

macro_rules! impl_proto_le {
    ($ty:ty, $put:ident, $get:ident) => {
        impl ProtoEncode for $ty {
            fn proto_encode(&self, dst: &mut impl BufMut) {
                dst.$put(*self);
            }
        }

        impl ProtoDecode for $ty {
            fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
                if src.remaining() < std::mem::size_of::<$ty>() {
                    return Err(ProtoError::UnexpectedEof);
                }
                Ok(src.$get())
            }
        }
    };
}

impl_proto_le!(u16, put_u16_le, get_u16_le);
impl_proto_le!(u32, put_u32_le, get_u32_le);
impl_proto_le!(u64, put_u64_le, get_u64_le);
impl_proto_le!(i32, put_i32_le, get_i32_le);
impl_proto_le!(i64, put_i64_le, get_i64_le);
impl_proto_le!(f32, put_f32_le, get_f32_le);

impl ProtoEncode for u8 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(*self);
    }
}

impl ProtoDecode for u8 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        if !src.has_remaining() {
            return Err(ProtoError::UnexpectedEof);
        }
        Ok(src.get_u8())
    }
}

impl ProtoEncode for bool {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(u8::from(*self));
    }
}

impl ProtoDecode for bool {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(u8::proto_decode(src)? != 0)
    }
}

// Strings are a varuint byte length followed by UTF-8.
impl ProtoEncode for String {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.as_str().proto_encode(dst);
    }
}

impl ProtoEncode for &str {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt32(self.len() as u32).proto_encode(dst);
        dst.put_slice(self.as_bytes());
    }
}

impl ProtoDecode for String {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let len = VarUInt32::proto_decode(src)?.0 as usize;
        if src.remaining() < len {
            return Err(ProtoError::LengthOutOfBounds { len });
        }
        let raw = src.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
    }
}

// UUIDs travel as their 16 raw bytes.
impl ProtoEncode for Uuid {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.as_bytes());
    }
}

impl ProtoDecode for Uuid {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        if src.remaining() < 16 {
            return Err(ProtoError::UnexpectedEof);
        }
        let mut raw = [0u8; 16];
        src.copy_to_slice(&mut raw);
        Ok(Uuid::from_bytes(raw))
    }
}

/// Pitch/yaw pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl ProtoEncode for Vec2 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.x.proto_encode(dst);
        self.y.proto_encode(dst);
    }
}

impl ProtoDecode for Vec2 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Vec2 {
            x: f32::proto_decode(src)?,
            y: f32::proto_decode(src)?,
        })
    }
}

/// World-space position or motion vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl ProtoEncode for Vec3 {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.x.proto_encode(dst);
        self.y.proto_encode(dst);
        self.z.proto_encode(dst);
    }
}

impl ProtoDecode for Vec3 {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Vec3 {
            x: f32::proto_decode(src)?,
            y: f32::proto_decode(src)?,
            z: f32::proto_decode(src)?,
        })
    }
}

/// Integer block position: signed x/z, unsigned y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockPos {
    pub x: i32,
    pub y: u32,
    pub z: i32,
}

impl BlockPos {
    pub const ZERO: BlockPos = BlockPos { x: 0, y: 0, z: 0 };
}

impl ProtoEncode for BlockPos {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt32(self.x).proto_encode(dst);
        VarUInt32(self.y).proto_encode(dst);
        VarInt32(self.z).proto_encode(dst);
    }
}

impl ProtoDecode for BlockPos {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(BlockPos {
            x: VarInt32::proto_decode(src)?.0,
            y: VarUInt32::proto_decode(src)?.0,
            z: VarInt32::proto_decode(src)?.0,
        })
    }
}

/// Capture whatever remains in the buffer. Used for packet tails the client
/// does not model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remainder(pub Bytes);

impl ProtoEncode for Remainder {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.0);
    }
}

impl ProtoDecode for Remainder {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let len = src.remaining();
        Ok(Remainder(src.copy_to_bytes(len)))
    }
}
