mod primitives;
mod sequence;
mod time;

pub use sequence::Sequence24;
pub use time::{raknet_start_time, RaknetTime};

/// 16-byte magic identifying offline RakNet packets.
pub type Magic = [u8; 16];

use std::net::SocketAddr;

use crate::protocol::constants::{ANY_V4, UNCONNECTED_MAGIC};
use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};
use bytes::{Buf, BufMut};

/// Zero padding that runs to the end of the datagram.
///
/// On encode this writes `len` zero bytes; on decode it swallows whatever
/// remains in the buffer and records how much was skipped. Used to pad the
/// first handshake packet out to the advertised MTU, and to absorb trailing
/// bytes some peers append to otherwise-empty packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtuPadding(pub usize);

impl RaknetEncodable for MtuPadding {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_bytes(0, self.0);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = src.remaining();
        src.advance(len);
        Ok(MtuPadding(len))
    }
}

/// Marker for the fixed offline magic.
///
/// Carries no data: encoding always writes the well-known 16 bytes, and
/// decoding rejects anything else, so packets that embed it get magic
/// validation for free from their field list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnconnectedMagic;

impl RaknetEncodable for UnconnectedMagic {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_slice(&UNCONNECTED_MAGIC);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if Magic::decode_raknet(src)? != UNCONNECTED_MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        Ok(UnconnectedMagic)
    }
}

/// The ten-slot system address list carried by the online handshake
/// packets: the relevant peer in slot zero, unspecified addresses after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAddresses(pub [SocketAddr; 10]);

impl SystemAddresses {
    pub fn seeded(peer: SocketAddr) -> Self {
        let mut slots = [SocketAddr::V4(ANY_V4); 10];
        slots[0] = peer;
        SystemAddresses(slots)
    }
}

impl RaknetEncodable for SystemAddresses {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        for address in &self.0 {
            address.encode_raknet(dst)?;
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let mut slots = [SocketAddr::V4(ANY_V4); 10];
        for slot in &mut slots {
            *slot = SocketAddr::decode_raknet(src)?;
        }
        Ok(SystemAddresses(slots))
    }
}
