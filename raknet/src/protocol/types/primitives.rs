use bytes::{Buf, BufMut};
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::protocol::types::Magic;
use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// Implements big-endian integer encoding/decoding for a concrete type.
macro_rules! impl_raknet_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl RaknetEncodable for $ty {
            fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
                dst.$put(*self as _);
                Ok(())
            }

            fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if src.remaining() < mem::size_of::<$ty>() {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get() as $ty)
            }
        }
    };
}

impl_raknet_int!(u16, put_u16, get_u16);
impl_raknet_int!(u32, put_u32, get_u32);
impl_raknet_int!(u64, put_u64, get_u64);
impl_raknet_int!(i64, put_i64, get_i64);

impl RaknetEncodable for u8 {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_u8(*self);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8())
    }
}

impl RaknetEncodable for bool {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_u8(u8::from(*self));
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(u8::decode_raknet(src)? == 1)
    }
}

impl RaknetEncodable for Magic {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_slice(self);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 16 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut magic = [0u8; 16];
        src.copy_to_slice(&mut magic);
        Ok(magic)
    }
}

// RakNet addresses carry a one-byte version, the (complemented, for v4)
// address bytes and the port. The v6 form serializes a C sockaddr_in6.
impl RaknetEncodable for SocketAddr {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        match self {
            SocketAddr::V4(addr) => {
                dst.put_u8(4);
                for octet in addr.ip().octets() {
                    dst.put_u8(!octet);
                }
                dst.put_u16(addr.port());
            }
            SocketAddr::V6(addr) => {
                dst.put_u8(6);
                dst.put_u16_le(23); // sin6_family (AF_INET6)
                dst.put_u16(addr.port());
                dst.put_u32(addr.flowinfo());
                dst.put_slice(&addr.ip().octets());
                dst.put_u32(addr.scope_id());
            }
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        match u8::decode_raknet(src)? {
            4 => {
                if src.remaining() < 6 {
                    return Err(DecodeError::UnexpectedEof);
                }
                let mut octets = [0u8; 4];
                src.copy_to_slice(&mut octets);
                for octet in &mut octets {
                    *octet = !*octet;
                }
                let port = src.get_u16();
                Ok(SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::from(octets),
                    port,
                )))
            }
            6 => {
                if src.remaining() < 2 + 2 + 4 + 16 + 4 {
                    return Err(DecodeError::UnexpectedEof);
                }
                let _family = src.get_u16_le();
                let port = src.get_u16();
                let flowinfo = src.get_u32();
                let mut octets = [0u8; 16];
                src.copy_to_slice(&mut octets);
                let scope_id = src.get_u32();
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    flowinfo,
                    scope_id,
                )))
            }
            version => Err(DecodeError::InvalidAddrVersion(version)),
        }
    }
}
