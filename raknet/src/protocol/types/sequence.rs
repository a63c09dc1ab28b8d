use bytes::{Buf, BufMut};

use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

const MODULO: u32 = 1 << 24;
const MASK: u32 = MODULO - 1;
const HALF: u32 = MODULO / 2;

/// 24-bit wrapping counter used for frame set sequences, reliable indices
/// and per-channel order/sequence indices. Encoded little-endian in 3 bytes.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct Sequence24(u32);

impl Sequence24 {
    pub const ZERO: Sequence24 = Sequence24(0);

    pub fn new(v: u32) -> Sequence24 {
        Sequence24(v & MASK)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Sequence24 {
        Sequence24::new(self.0.wrapping_add(1))
    }

    /// Post-increment: returns the current value and steps to the next.
    pub fn take(&mut self) -> Sequence24 {
        let current = *self;
        *self = self.next();
        current
    }

    /// Number of steps from `self` forward to `newer`, modulo 2^24.
    pub fn distance_to(&self, newer: Sequence24) -> u32 {
        if newer.0 >= self.0 {
            newer.0 - self.0
        } else {
            (MODULO - self.0) + newer.0
        }
    }
}

// Wrap-aware ordering: a value is "newer" than another when it is less than
// half the sequence space ahead of it.
impl Ord for Sequence24 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let delta = (self.0 as i32).wrapping_sub(other.0 as i32);
        if delta == 0 {
            std::cmp::Ordering::Equal
        } else if (delta > 0 && delta < HALF as i32) || delta < -(HALF as i32) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Less
        }
    }
}

impl PartialOrd for Sequence24 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl RaknetEncodable for Sequence24 {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_u8((self.0 & 0xFF) as u8);
        dst.put_u8(((self.0 >> 8) & 0xFF) as u8);
        dst.put_u8(((self.0 >> 16) & 0xFF) as u8);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 3 {
            return Err(DecodeError::UnexpectedEof);
        }
        let b0 = src.get_u8() as u32;
        let b1 = src.get_u8() as u32;
        let b2 = src.get_u8() as u32;
        Ok(Sequence24::new(b0 | (b1 << 8) | (b2 << 16)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn wraps_on_next() {
        assert_eq!(Sequence24::new(MASK).next().value(), 0);
    }

    #[test]
    fn ordering_handles_wrap() {
        let a = Sequence24::new(MASK);
        let b = a.next();
        let c = b.next();

        assert!(c > b);
        assert!(b > a);
        assert!(c > a);
    }

    #[test]
    fn take_post_increments() {
        let mut seq = Sequence24::ZERO;
        assert_eq!(seq.take().value(), 0);
        assert_eq!(seq.take().value(), 1);
        assert_eq!(seq.value(), 2);
    }

    #[test]
    fn little_endian_three_byte_encoding() {
        let mut buf = BytesMut::new();
        Sequence24::new(0x0A0B0C).encode_raknet(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x0C, 0x0B, 0x0A]);
        let mut slice = buf.freeze();
        assert_eq!(
            Sequence24::decode_raknet(&mut slice).unwrap().value(),
            0x0A0B0C
        );
    }
}
