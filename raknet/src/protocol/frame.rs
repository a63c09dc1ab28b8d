use bytes::{Buf, BufMut, Bytes};

use crate::protocol::ack::AckRecord;
use crate::protocol::constants::{
    DatagramFlags, FRAME_FLAG_FRAGMENTED, FRAME_FLAG_NEEDS_BAS, FRAME_SET_HEADER_SIZE,
};
use crate::protocol::reliability::Reliability;
use crate::protocol::types::Sequence24;
use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// Fragmentation metadata of a frame that is part of a split payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    /// Total number of fragments making up the payload.
    pub size: u32,
    /// Identifier shared by every fragment of one payload.
    pub id: u16,
    /// Position of this fragment within the payload.
    pub index: u32,
}

/// A single reliability-annotated payload within a frame set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub reliability: Reliability,
    pub reliable_index: Option<Sequence24>,
    pub sequence_index: Option<Sequence24>,
    pub order_index: Option<Sequence24>,
    pub order_channel: Option<u8>,
    pub fragment: Option<FragmentInfo>,
    pub payload: Bytes,
}

impl Frame {
    /// Build an unfragmented frame without any assigned indices.
    pub fn new(reliability: Reliability, payload: Bytes) -> Self {
        Self {
            reliability,
            reliable_index: None,
            sequence_index: None,
            order_index: None,
            order_channel: None,
            fragment: None,
            payload,
        }
    }

    /// On-wire size of this frame (header byte, length, indices, fragment
    /// fields and payload).
    pub fn wire_size(&self) -> usize {
        let mut size = 3; // header byte + 16-bit length
        if self.reliability.is_reliable() {
            size += 3;
        }
        if self.reliability.is_sequenced() {
            size += 3;
        }
        if self.reliability.is_ordered() || self.reliability.is_sequenced() {
            size += 4; // order index + channel
        }
        if self.fragment.is_some() {
            size += 10; // count (u32) + id (u16) + index (u32)
        }
        size + self.payload.len()
    }
}

impl RaknetEncodable for Frame {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        let mut header = (self.reliability as u8) << 5;
        if self.fragment.is_some() {
            header |= FRAME_FLAG_FRAGMENTED;
        }
        dst.put_u8(header);
        dst.put_u16((self.payload.len() as u16) << 3); // length in bits

        if self.reliability.is_reliable() {
            self.reliable_index
                .ok_or(EncodeError::MissingReliableIndex)?
                .encode_raknet(dst)?;
        }
        if self.reliability.is_sequenced() {
            self.sequence_index
                .ok_or(EncodeError::MissingSequenceIndex)?
                .encode_raknet(dst)?;
        }
        if self.reliability.is_ordered() || self.reliability.is_sequenced() {
            self.order_index
                .ok_or(EncodeError::MissingOrderIndex)?
                .encode_raknet(dst)?;
            dst.put_u8(self.order_channel.unwrap_or(0));
        }
        if let Some(fragment) = &self.fragment {
            dst.put_u32(fragment.size);
            dst.put_u16(fragment.id);
            dst.put_u32(fragment.index);
        }
        dst.put_slice(&self.payload);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let header = u8::decode_raknet(src)?;
        let reliability = Reliability::try_from(header >> 5)?;
        let fragmented = header & FRAME_FLAG_FRAGMENTED != 0;
        let _needs_bas = header & FRAME_FLAG_NEEDS_BAS != 0;

        let bit_length = u16::decode_raknet(src)?;
        let payload_len = ((bit_length as usize) + 7) >> 3;

        let reliable_index = if reliability.is_reliable() {
            Some(Sequence24::decode_raknet(src)?)
        } else {
            None
        };
        let sequence_index = if reliability.is_sequenced() {
            Some(Sequence24::decode_raknet(src)?)
        } else {
            None
        };
        let (order_index, order_channel) =
            if reliability.is_ordered() || reliability.is_sequenced() {
                let index = Sequence24::decode_raknet(src)?;
                let channel = u8::decode_raknet(src)?;
                (Some(index), Some(channel))
            } else {
                (None, None)
            };
        let fragment = if fragmented {
            Some(FragmentInfo {
                size: u32::decode_raknet(src)?,
                id: u16::decode_raknet(src)?,
                index: u32::decode_raknet(src)?,
            })
        } else {
            None
        };

        if src.remaining() < payload_len {
            return Err(DecodeError::UnexpectedEof);
        }
        let payload = src.copy_to_bytes(payload_len);

        Ok(Frame {
            reliability,
            reliable_index,
            sequence_index,
            order_index,
            order_channel,
            fragment,
            payload,
        })
    }
}

/// A numbered bundle of frames transmitted as one UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    pub sequence: Sequence24,
    pub frames: Vec<Frame>,
}

impl FrameSet {
    pub fn wire_size(&self) -> usize {
        FRAME_SET_HEADER_SIZE + self.frames.iter().map(Frame::wire_size).sum::<usize>()
    }
}

/// A single raw RakNet UDP datagram: either a frame set or a lightweight
/// ACK/NACK record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Frames(FrameSet),
    Ack(AckRecord),
    Nack(AckRecord),
}

impl Datagram {
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        match self {
            Datagram::Frames(set) => {
                dst.put_u8((DatagramFlags::VALID | DatagramFlags::HAS_B_AND_AS).bits());
                set.sequence.encode_raknet(dst)?;
                for frame in &set.frames {
                    frame.encode_raknet(dst)?;
                }
            }
            Datagram::Ack(record) => {
                dst.put_u8((DatagramFlags::VALID | DatagramFlags::ACK).bits());
                record.encode_raknet(dst)?;
            }
            Datagram::Nack(record) => {
                dst.put_u8((DatagramFlags::VALID | DatagramFlags::NACK).bits());
                record.encode_raknet(dst)?;
            }
        }
        Ok(())
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let raw_flags = u8::decode_raknet(src)?;
        let flags = DatagramFlags::from_bits_truncate(raw_flags);

        if !flags.contains(DatagramFlags::VALID) {
            return Err(DecodeError::InvalidDatagramHeader(raw_flags));
        }
        if flags.contains(DatagramFlags::ACK) {
            return Ok(Datagram::Ack(AckRecord::decode_raknet(src)?));
        }
        if flags.contains(DatagramFlags::NACK) {
            return Ok(Datagram::Nack(AckRecord::decode_raknet(src)?));
        }

        let sequence = Sequence24::decode_raknet(src)?;
        let mut frames = Vec::new();
        while src.has_remaining() {
            frames.push(Frame::decode_raknet(src)?);
        }
        Ok(Datagram::Frames(FrameSet { sequence, frames }))
    }
}
