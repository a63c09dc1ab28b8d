use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// Delivery guarantee carried in the top three bits of a frame header.
///
/// The client itself only sends `Unreliable`, `Reliable`, `ReliableOrdered`
/// and the sequenced modes, but a server may stamp any of the eight values
/// onto inbound frames, so the full wire enum is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reliability {
    Unreliable = 0,
    UnreliableSequenced = 1,
    Reliable = 2,
    ReliableOrdered = 3,
    ReliableSequenced = 4,
    UnreliableWithAckReceipt = 5,
    ReliableWithAckReceipt = 6,
    ReliableOrderedWithAckReceipt = 7,
}

impl Reliability {
    /// Whether frames of this reliability carry a reliable index and take
    /// part in retransmission.
    #[inline]
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Reliability::Reliable
                | Reliability::ReliableOrdered
                | Reliability::ReliableSequenced
                | Reliability::ReliableWithAckReceipt
                | Reliability::ReliableOrderedWithAckReceipt
        )
    }

    /// Order-exclusive delivery: each frame consumes an order index and is
    /// held back until every earlier index on its channel has been delivered.
    #[inline]
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            Reliability::ReliableOrdered | Reliability::ReliableOrderedWithAckReceipt
        )
    }

    /// Sequenced delivery: frames reuse the channel's current order index and
    /// carry their own monotonically increasing sequence index.
    #[inline]
    pub fn is_sequenced(self) -> bool {
        matches!(
            self,
            Reliability::UnreliableSequenced | Reliability::ReliableSequenced
        )
    }
}

impl TryFrom<u8> for Reliability {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Reliability::Unreliable),
            1 => Ok(Reliability::UnreliableSequenced),
            2 => Ok(Reliability::Reliable),
            3 => Ok(Reliability::ReliableOrdered),
            4 => Ok(Reliability::ReliableSequenced),
            5 => Ok(Reliability::UnreliableWithAckReceipt),
            6 => Ok(Reliability::ReliableWithAckReceipt),
            7 => Ok(Reliability::ReliableOrderedWithAckReceipt),
            _ => Err(DecodeError::UnknownReliability(value)),
        }
    }
}

impl RaknetEncodable for Reliability {
    fn encode_raknet(&self, dst: &mut impl bytes::BufMut) -> Result<(), EncodeError> {
        (*self as u8).encode_raknet(dst)
    }

    fn decode_raknet(src: &mut impl bytes::Buf) -> Result<Self, DecodeError> {
        Reliability::try_from(u8::decode_raknet(src)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_split_matches_wire_semantics() {
        assert!(Reliability::ReliableOrdered.is_reliable());
        assert!(Reliability::ReliableOrdered.is_ordered());
        assert!(!Reliability::ReliableOrdered.is_sequenced());

        assert!(Reliability::UnreliableSequenced.is_sequenced());
        assert!(!Reliability::UnreliableSequenced.is_reliable());

        assert!(Reliability::ReliableSequenced.is_reliable());
        assert!(!Reliability::ReliableSequenced.is_ordered());
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!(matches!(
            Reliability::try_from(8),
            Err(DecodeError::UnknownReliability(8))
        ));
    }
}
