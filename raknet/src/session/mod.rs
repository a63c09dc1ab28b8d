//! Per-connection RakNet session state: outbound queueing and retransmission
//! backup, inbound deduplication/reassembly, and the online handshake.
//!
//! The `Session` owns every reliability counter of the connection:
//! - Reliability (reliable index assignment, ACK/NACK reactions)
//! - Ordering (per-channel order/sequence indices, reorder buffering)
//! - Fragmentation (splitting oversize payloads, reassembling inbound splits)
//!
//! All methods are synchronous; the transport drives the session from a
//! single task and ships whatever `take_datagrams` yields.

mod handshake;
mod inbound;
mod outbound;

pub use handshake::SessionSignal;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::SocketAddr;

use crate::protocol::constants::{MTU, ORDER_CHANNEL_COUNT};
use crate::protocol::frame::{Datagram, Frame};
use crate::protocol::types::Sequence24;

/// Send urgency of an outbound frame.
///
/// `Normal` frames ride along in the next flushed frame set; `Immediate`
/// frames force the current set onto the wire right away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    Immediate,
}

pub(crate) struct FragmentAssembly {
    reliability: crate::protocol::reliability::Reliability,
    sequence_index: Option<Sequence24>,
    order_index: Option<Sequence24>,
    order_channel: Option<u8>,
    parts: Vec<Option<bytes::Bytes>>,
    received: usize,
}

pub struct Session {
    peer: SocketAddr,
    local: SocketAddr,
    guid: u64,
    mtu: usize,
    established: bool,

    // Outbound state.
    reliable_index: Sequence24,
    order_index: [Sequence24; ORDER_CHANNEL_COUNT],
    sequence_index: [Sequence24; ORDER_CHANNEL_COUNT],
    fragment_id: u16,
    frame_set_sequence: Sequence24,
    current_set: Vec<Frame>,
    current_set_size: usize,
    backup: BTreeMap<u32, Vec<Frame>>,
    outgoing: VecDeque<Datagram>,

    // Inbound state.
    received_sequences: HashSet<u32>,
    lost_sequences: HashSet<u32>,
    last_sequence: Option<Sequence24>,
    fragments: HashMap<u16, FragmentAssembly>,
    expected_order_index: [Sequence24; ORDER_CHANNEL_COUNT],
    ordering_queue: Vec<HashMap<u32, Frame>>,
    pending_acks: Vec<u32>,
    pending_nacks: Vec<u32>,
}

impl Session {
    pub fn new(peer: SocketAddr, local: SocketAddr, guid: u64) -> Self {
        Self {
            peer,
            local,
            guid,
            mtu: MTU,
            established: false,

            reliable_index: Sequence24::ZERO,
            order_index: [Sequence24::ZERO; ORDER_CHANNEL_COUNT],
            sequence_index: [Sequence24::ZERO; ORDER_CHANNEL_COUNT],
            fragment_id: 0,
            frame_set_sequence: Sequence24::ZERO,
            current_set: Vec::new(),
            current_set_size: 0,
            backup: BTreeMap::new(),
            outgoing: VecDeque::new(),

            received_sequences: HashSet::new(),
            lost_sequences: HashSet::new(),
            last_sequence: None,
            fragments: HashMap::new(),
            expected_order_index: [Sequence24::ZERO; ORDER_CHANNEL_COUNT],
            ordering_queue: (0..ORDER_CHANNEL_COUNT).map(|_| HashMap::new()).collect(),
            pending_acks: Vec::new(),
            pending_nacks: Vec::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Drain every datagram that is ready for the wire.
    pub fn take_datagrams(&mut self) -> Vec<Datagram> {
        self.outgoing.drain(..).collect()
    }

    /// Periodic maintenance, run on the 10 ms transport tick: emit any
    /// pending ACK/NACK records and flush a lingering frame set.
    pub fn on_tick(&mut self) {
        self.flush_acknowledgements();
        self.flush_frame_set();
    }
}
