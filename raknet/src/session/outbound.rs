use bytes::Bytes;

use crate::protocol::ack::AckRecord;
use crate::protocol::constants::{FRAGMENT_OVERHEAD, FRAME_SET_OVERHEAD, ORDER_CHANNEL_COUNT};
use crate::protocol::frame::{Datagram, Frame, FragmentInfo, FrameSet};
use crate::protocol::reliability::Reliability;
use crate::protocol::types::Sequence24;

use super::{Priority, Session};

impl Session {
    /// Queue a payload for delivery.
    ///
    /// Assigns order/sequence/reliable indices, fragments payloads that do
    /// not fit a single frame, and packs frames into the current frame set.
    pub fn enqueue(
        &mut self,
        payload: Bytes,
        reliability: Reliability,
        channel: u8,
        priority: Priority,
    ) {
        let ch = channel as usize;
        if ch >= ORDER_CHANNEL_COUNT {
            tracing::warn!(channel, "dropping frame on out-of-range order channel");
            return;
        }

        // Sequenced frames reuse the channel's current order index and burn a
        // sequence index; order-exclusive frames consume an order index and
        // reset the sequence counter.
        let (order_index, sequence_index) = if reliability.is_sequenced() {
            (
                Some(self.order_index[ch]),
                Some(self.sequence_index[ch].take()),
            )
        } else if reliability.is_ordered() {
            self.sequence_index[ch] = Sequence24::ZERO;
            (Some(self.order_index[ch].take()), None)
        } else {
            (None, None)
        };

        let max_payload = self.mtu - FRAGMENT_OVERHEAD;
        if payload.len() > max_payload {
            self.enqueue_fragments(
                payload,
                reliability,
                channel,
                order_index,
                sequence_index,
                priority,
            );
            return;
        }

        let frame = Frame {
            reliability,
            reliable_index: self.next_reliable_index(reliability),
            sequence_index,
            order_index,
            order_channel: order_index.map(|_| channel),
            fragment: None,
            payload,
        };
        self.append_frame(frame, priority);
    }

    /// Split an oversize payload into fragments sharing one fragment id and
    /// the already-assigned order/sequence indices. Every fragment is its own
    /// frame record with its own reliable index.
    fn enqueue_fragments(
        &mut self,
        mut payload: Bytes,
        reliability: Reliability,
        channel: u8,
        order_index: Option<Sequence24>,
        sequence_index: Option<Sequence24>,
        priority: Priority,
    ) {
        // Fragments must survive loss individually or the whole payload is
        // unrecoverable, so unreliable modes are promoted.
        let reliability = match reliability {
            Reliability::Unreliable => Reliability::Reliable,
            Reliability::UnreliableSequenced => Reliability::ReliableSequenced,
            other => other,
        };

        let part_size = self.mtu - FRAGMENT_OVERHEAD;
        let total = payload.len();
        let count = total.div_ceil(part_size) as u32;
        let id = self.fragment_id;
        self.fragment_id = self.fragment_id.wrapping_add(1);

        tracing::trace!(id, count, total, "fragmenting payload");

        for index in 0..count {
            let take = payload.len().min(part_size);
            let chunk = payload.split_to(take);
            let frame = Frame {
                reliability,
                reliable_index: self.next_reliable_index(reliability),
                sequence_index,
                order_index,
                order_channel: order_index.map(|_| channel),
                fragment: Some(FragmentInfo {
                    size: count,
                    id,
                    index,
                }),
                payload: chunk,
            };
            self.append_frame(frame, priority);
        }
        debug_assert!(payload.is_empty());
    }

    fn next_reliable_index(&mut self, reliability: Reliability) -> Option<Sequence24> {
        reliability.is_reliable().then(|| self.reliable_index.take())
    }

    /// Append a fully-formed frame to the current frame set, flushing first
    /// if the set would outgrow the datagram budget.
    pub(crate) fn append_frame(&mut self, frame: Frame, priority: Priority) {
        let size = frame.wire_size();
        if self.current_set_size + size > self.mtu - FRAME_SET_OVERHEAD {
            self.flush_frame_set();
        }
        self.current_set.push(frame);
        self.current_set_size += size;

        if priority == Priority::Immediate {
            self.flush_frame_set();
        }
    }

    /// Stamp the current frame set with the next sequence number, keep a
    /// backup of its reliable frames for retransmission, and stage it for
    /// the wire.
    pub(crate) fn flush_frame_set(&mut self) {
        if self.current_set.is_empty() {
            return;
        }

        let sequence = self.frame_set_sequence.take();
        let frames = std::mem::take(&mut self.current_set);
        self.current_set_size = 0;

        let reliable: Vec<Frame> = frames
            .iter()
            .filter(|frame| frame.reliability.is_reliable())
            .cloned()
            .collect();
        if !reliable.is_empty() {
            self.backup.insert(sequence.value(), reliable);
        }

        self.outgoing
            .push_back(Datagram::Frames(FrameSet { sequence, frames }));
    }

    /// The peer acknowledged these frame sets; their backups are done.
    pub(crate) fn on_ack(&mut self, record: AckRecord) {
        for sequence in record.sequences() {
            self.backup.remove(&sequence.value());
        }
    }

    /// The peer reported these frame sets missing: retransmit their reliable
    /// frames at `Immediate` priority, keeping the original indices so the
    /// receiver can deduplicate.
    pub(crate) fn on_nack(&mut self, record: AckRecord) {
        for sequence in record.sequences() {
            let Some(frames) = self.backup.remove(&sequence.value()) else {
                continue;
            };
            tracing::debug!(
                sequence = sequence.value(),
                frames = frames.len(),
                "retransmitting nacked frame set"
            );
            for frame in frames {
                self.append_frame(frame, Priority::Immediate);
            }
        }
    }

    /// Emit pending ACK and NACK lists as run-length encoded records.
    pub(crate) fn flush_acknowledgements(&mut self) {
        if !self.pending_acks.is_empty() {
            let record = AckRecord::from_sequences(std::mem::take(&mut self.pending_acks));
            self.outgoing.push_back(Datagram::Ack(record));
        }
        if !self.pending_nacks.is_empty() {
            let record = AckRecord::from_sequences(std::mem::take(&mut self.pending_nacks));
            self.outgoing.push_back(Datagram::Nack(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::MTU;

    fn session() -> Session {
        Session::new(
            "127.0.0.1:19132".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
            1,
        )
    }

    fn frames_of(datagram: &Datagram) -> &[Frame] {
        match datagram {
            Datagram::Frames(set) => &set.frames,
            other => panic!("expected frame set, got {other:?}"),
        }
    }

    #[test]
    fn reliable_indices_are_gapless() {
        let mut s = session();
        for _ in 0..5 {
            s.enqueue(
                Bytes::from_static(b"x"),
                Reliability::ReliableOrdered,
                0,
                Priority::Immediate,
            );
        }
        let datagrams = s.take_datagrams();
        let indices: Vec<u32> = datagrams
            .iter()
            .flat_map(|d| frames_of(d).iter())
            .map(|f| f.reliable_index.unwrap().value())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn ordered_frames_consume_order_indices() {
        let mut s = session();
        for _ in 0..3 {
            s.enqueue(
                Bytes::from_static(b"x"),
                Reliability::ReliableOrdered,
                2,
                Priority::Immediate,
            );
        }
        let datagrams = s.take_datagrams();
        let orders: Vec<u32> = datagrams
            .iter()
            .flat_map(|d| frames_of(d).iter())
            .map(|f| f.order_index.unwrap().value())
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(datagrams
            .iter()
            .flat_map(|d| frames_of(d).iter())
            .all(|f| f.order_channel == Some(2)));
    }

    #[test]
    fn sequenced_frames_share_order_index() {
        let mut s = session();
        // Consume one order index on the channel first.
        s.enqueue(
            Bytes::from_static(b"o"),
            Reliability::ReliableOrdered,
            0,
            Priority::Immediate,
        );
        for _ in 0..3 {
            s.enqueue(
                Bytes::from_static(b"s"),
                Reliability::UnreliableSequenced,
                0,
                Priority::Immediate,
            );
        }
        let datagrams = s.take_datagrams();
        let sequenced: Vec<&Frame> = datagrams
            .iter()
            .flat_map(|d| frames_of(d).iter())
            .filter(|f| f.reliability.is_sequenced())
            .collect();
        assert!(sequenced.iter().all(|f| f.order_index.unwrap().value() == 1));
        let seqs: Vec<u32> = sequenced
            .iter()
            .map(|f| f.sequence_index.unwrap().value())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn oversize_payload_is_fragmented_with_own_reliable_indices() {
        let mut s = session();
        let part = MTU - FRAGMENT_OVERHEAD;
        let payload = Bytes::from(vec![7u8; part * 2 + 100]);
        s.enqueue(
            payload.clone(),
            Reliability::ReliableOrdered,
            0,
            Priority::Immediate,
        );
        let datagrams = s.take_datagrams();
        let frames: Vec<&Frame> = datagrams.iter().flat_map(|d| frames_of(d).iter()).collect();
        assert_eq!(frames.len(), 3);

        let mut reassembled = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            let fragment = frame.fragment.unwrap();
            assert_eq!(fragment.size, 3);
            assert_eq!(fragment.index, i as u32);
            assert_eq!(fragment.id, frames[0].fragment.unwrap().id);
            assert_eq!(frame.reliable_index.unwrap().value(), i as u32);
            assert_eq!(frame.order_index, frames[0].order_index);
            reassembled.extend_from_slice(&frame.payload);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn normal_priority_waits_for_tick_flush() {
        let mut s = session();
        s.enqueue(
            Bytes::from_static(b"x"),
            Reliability::Reliable,
            0,
            Priority::Normal,
        );
        assert!(s.take_datagrams().is_empty());
        s.on_tick();
        assert_eq!(s.take_datagrams().len(), 1);
    }

    #[test]
    fn full_frame_set_is_flushed_before_overflowing() {
        let mut s = session();
        let chunk = Bytes::from(vec![1u8; 700]);
        for _ in 0..3 {
            s.enqueue(chunk.clone(), Reliability::Reliable, 0, Priority::Normal);
        }
        s.on_tick();
        let datagrams = s.take_datagrams();
        assert_eq!(datagrams.len(), 2);
        assert!(datagrams
            .iter()
            .all(|d| matches!(d, Datagram::Frames(set) if set.wire_size() <= MTU)));
    }

    #[test]
    fn nack_retransmits_backed_up_frames_with_original_indices() {
        let mut s = session();
        for _ in 0..3 {
            s.enqueue(
                Bytes::from_static(b"x"),
                Reliability::ReliableOrdered,
                0,
                Priority::Immediate,
            );
        }
        let _ = s.take_datagrams();

        s.on_nack(AckRecord::from_sequences(vec![1]));
        let retransmitted = s.take_datagrams();
        assert_eq!(retransmitted.len(), 1);
        let frames = frames_of(&retransmitted[0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].reliable_index.unwrap().value(), 1);
        assert_eq!(frames[0].order_index.unwrap().value(), 1);
    }

    #[test]
    fn ack_prunes_backup() {
        let mut s = session();
        s.enqueue(
            Bytes::from_static(b"x"),
            Reliability::Reliable,
            0,
            Priority::Immediate,
        );
        let _ = s.take_datagrams();
        s.on_ack(AckRecord::from_sequences(vec![0]));

        // A later NACK for the same set finds nothing to resend.
        s.on_nack(AckRecord::from_sequences(vec![0]));
        assert!(s.take_datagrams().is_empty());
    }

    #[test]
    fn unreliable_frames_are_not_backed_up() {
        let mut s = session();
        s.enqueue(
            Bytes::from_static(b"x"),
            Reliability::Unreliable,
            0,
            Priority::Immediate,
        );
        let _ = s.take_datagrams();
        s.on_nack(AckRecord::from_sequences(vec![0]));
        assert!(s.take_datagrams().is_empty());
    }
}
