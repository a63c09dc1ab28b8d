//! Shared protocol-level constants and flags for the RakNet client.
//!
//! These values mirror the behaviour of the Bedrock flavour of RakNet and
//! should be treated as part of the wire-level contract.

use bitflags::bitflags;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::protocol::types::Magic;

// === Protocol / version ===

/// RakNet protocol version spoken by Bedrock servers.
pub const RAKNET_PROTOCOL_VERSION: u8 = 11;

// === MTU and framing sizes ===

/// The fixed MTU this client advertises and packs datagrams against.
/// There is no MTU discovery; Bedrock servers accept 1492 universally.
pub const MTU: usize = 1492;

/// Flags byte + 24-bit sequence number.
pub const FRAME_SET_HEADER_SIZE: usize = 4;

/// Worst-case per-frame overhead (flags, length, indexes, fragment fields)
/// plus the frame set header. Payloads larger than `MTU - FRAGMENT_OVERHEAD`
/// are split into fragments of exactly that size.
pub const FRAGMENT_OVERHEAD: usize = 29;

/// Budget reserved for headers when packing frames into a frame set. A frame
/// set is flushed before it would grow past `MTU - FRAME_SET_OVERHEAD`.
pub const FRAME_SET_OVERHEAD: usize = 36;

/// Number of independent ordering channels.
pub const ORDER_CHANNEL_COUNT: usize = 32;

/// Upper bound on ranges accepted in a single ACK/NACK record.
pub const MAX_ACK_RANGES: u16 = 4096;

// === Timing ===

/// Cadence at which pending ACK/NACK lists are flushed to the wire.
pub const ACK_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Time allowed for each stage of the offline connection handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

bitflags! {
    /// Flags for the leading byte of a RakNet UDP datagram.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DatagramFlags: u8 {
        const VALID           = 0b1000_0000;
        const ACK             = 0b0100_0000;
        const NACK            = 0b0010_0000;
        /// Datagram is part of a packet pair (bandwidth probing).
        const PACKET_PAIR     = 0b0001_0000;
        /// Sender will transmit additional datagrams immediately after this one.
        const CONTINUOUS_SEND = 0b0000_1000;
        /// Datagram requests/needs B&AS (bandwidth and smoothness) info.
        const HAS_B_AND_AS    = 0b0000_0100;
    }
}

// Flag bits inside the frame header byte.
pub const FRAME_FLAG_FRAGMENTED: u8 = 0b0001_0000;
pub const FRAME_FLAG_NEEDS_BAS: u8 = 0b0000_0100;

/// Magic used to identify offline RakNet packets.
pub const UNCONNECTED_MAGIC: Magic = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

/// Placeholder address used to pad the system-address lists of the online
/// handshake packets.
pub const ANY_V4: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
