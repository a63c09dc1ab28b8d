use bytes::{Bytes, BytesMut};

use crate::protocol::constants::ORDER_CHANNEL_COUNT;
use crate::protocol::frame::{Datagram, Frame, FrameSet};
use crate::protocol::types::Sequence24;

use super::{FragmentAssembly, Session};

impl Session {
    /// Handle one inbound datagram and return any clean payloads that are
    /// ready for the layer above, in delivery order.
    pub fn handle_datagram(&mut self, datagram: Datagram) -> Vec<Bytes> {
        match datagram {
            Datagram::Frames(set) => self.handle_frame_set(set),
            Datagram::Ack(record) => {
                self.on_ack(record);
                Vec::new()
            }
            Datagram::Nack(record) => {
                self.on_nack(record);
                Vec::new()
            }
        }
    }

    fn handle_frame_set(&mut self, set: FrameSet) -> Vec<Bytes> {
        let sequence = set.sequence;

        if let Some(last) = self.last_sequence {
            if sequence <= last {
                tracing::trace!(
                    sequence = sequence.value(),
                    last = last.value(),
                    "discarding duplicate or stale frame set"
                );
                return Vec::new();
            }
        }

        self.received_sequences.insert(sequence.value());
        self.pending_acks.push(sequence.value());

        // Every sequence skipped between the previous highest and this one is
        // provisionally lost and gets NACKed on the next flush.
        let mut missing = match self.last_sequence {
            Some(last) => last.next(),
            None => Sequence24::ZERO,
        };
        while missing < sequence {
            if !self.received_sequences.contains(&missing.value()) {
                self.lost_sequences.insert(missing.value());
                self.pending_nacks.push(missing.value());
            }
            missing = missing.next();
        }

        self.last_sequence = Some(sequence);

        let mut out = Vec::new();
        for frame in set.frames {
            self.dispatch_frame(frame, &mut out);
        }
        out
    }

    fn dispatch_frame(&mut self, frame: Frame, out: &mut Vec<Bytes>) {
        if frame.fragment.is_some() {
            if let Some(whole) = self.assemble_fragment(frame) {
                self.dispatch_frame(whole, out);
            }
            return;
        }

        if frame.reliability.is_ordered() {
            self.handle_ordered(frame, out);
        } else {
            out.push(frame.payload);
        }
    }

    /// Stash a fragment; when the last piece arrives, concatenate all parts
    /// in index order into a synthetic frame that re-enters dispatch with the
    /// original reliability metadata.
    fn assemble_fragment(&mut self, frame: Frame) -> Option<Frame> {
        let Some(fragment) = frame.fragment else {
            return Some(frame);
        };

        if fragment.size == 0 || fragment.index >= fragment.size {
            tracing::warn!(
                id = fragment.id,
                index = fragment.index,
                size = fragment.size,
                "dropping frame with invalid fragment metadata"
            );
            return None;
        }

        let entry = self
            .fragments
            .entry(fragment.id)
            .or_insert_with(|| FragmentAssembly {
                reliability: frame.reliability,
                sequence_index: frame.sequence_index,
                order_index: frame.order_index,
                order_channel: frame.order_channel,
                parts: vec![None; fragment.size as usize],
                received: 0,
            });

        if entry.parts.len() != fragment.size as usize {
            tracing::warn!(id = fragment.id, "fragment count mismatch, dropping");
            return None;
        }

        let slot = &mut entry.parts[fragment.index as usize];
        if slot.is_some() {
            // Duplicate part, ignore.
            return None;
        }
        *slot = Some(frame.payload);
        entry.received += 1;

        if entry.received != entry.parts.len() {
            return None;
        }

        let entry = self.fragments.remove(&fragment.id)?;
        let mut payload = BytesMut::new();
        for part in entry.parts.iter().flatten() {
            payload.extend_from_slice(part);
        }

        tracing::trace!(id = fragment.id, len = payload.len(), "reassembled split payload");

        Some(Frame {
            reliability: entry.reliability,
            reliable_index: None,
            sequence_index: entry.sequence_index,
            order_index: entry.order_index,
            order_channel: entry.order_channel,
            fragment: None,
            payload: payload.freeze(),
        })
    }

    /// Deliver an ordered frame if it is the channel's next expected index,
    /// then drain any contiguous run parked behind it. Out-of-order frames
    /// are parked; stale ones are dropped.
    fn handle_ordered(&mut self, frame: Frame, out: &mut Vec<Bytes>) {
        let channel = frame.order_channel.unwrap_or(0) as usize;
        if channel >= ORDER_CHANNEL_COUNT {
            tracing::warn!(channel, "dropping frame on out-of-range order channel");
            return;
        }
        let Some(index) = frame.order_index else {
            tracing::warn!("ordered frame without order index");
            return;
        };

        let expected = self.expected_order_index[channel];
        if index == expected {
            out.push(frame.payload);
            let mut next = expected.next();
            while let Some(parked) = self.ordering_queue[channel].remove(&next.value()) {
                out.push(parked.payload);
                next = next.next();
            }
            self.expected_order_index[channel] = next;
        } else if index > expected {
            self.ordering_queue[channel].insert(index.value(), frame);
        } else {
            tracing::trace!(
                channel,
                index = index.value(),
                expected = expected.value(),
                "dropping stale ordered frame"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ack::AckRecord;
    use crate::protocol::frame::FragmentInfo;
    use crate::protocol::reliability::Reliability;

    fn session() -> Session {
        Session::new(
            "127.0.0.1:19132".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
            1,
        )
    }

    fn frame_set(sequence: u32, frames: Vec<Frame>) -> Datagram {
        Datagram::Frames(FrameSet {
            sequence: Sequence24::new(sequence),
            frames,
        })
    }

    fn plain_frame(payload: &'static [u8]) -> Frame {
        Frame::new(Reliability::Unreliable, Bytes::from_static(payload))
    }

    fn ordered_frame(order: u32, payload: &'static [u8]) -> Frame {
        Frame {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(Sequence24::new(order)),
            sequence_index: None,
            order_index: Some(Sequence24::new(order)),
            order_channel: Some(0),
            fragment: None,
            payload: Bytes::from_static(payload),
        }
    }

    fn pending_ack_record(s: &mut Session) -> Option<AckRecord> {
        s.flush_acknowledgements();
        s.take_datagrams().into_iter().find_map(|d| match d {
            Datagram::Ack(record) => Some(record),
            _ => None,
        })
    }

    fn pending_nack_record(s: &mut Session) -> Option<AckRecord> {
        s.flush_acknowledgements();
        s.take_datagrams().into_iter().find_map(|d| match d {
            Datagram::Nack(record) => Some(record),
            _ => None,
        })
    }

    #[test]
    fn acks_every_new_sequence_once() {
        let mut s = session();
        s.handle_datagram(frame_set(0, vec![plain_frame(b"a")]));
        s.handle_datagram(frame_set(1, vec![plain_frame(b"b")]));
        let record = pending_ack_record(&mut s).expect("ack record");
        let values: Vec<u32> = record.sequences().map(|x| x.value()).collect();
        assert_eq!(values, vec![0, 1]);
        // Nothing left pending after the flush.
        assert!(pending_ack_record(&mut s).is_none());
    }

    #[test]
    fn gap_produces_nacks_for_missing_sequences() {
        let mut s = session();
        s.handle_datagram(frame_set(0, vec![plain_frame(b"a")]));
        s.handle_datagram(frame_set(4, vec![plain_frame(b"b")]));
        let record = pending_nack_record(&mut s).expect("nack record");
        let values: Vec<u32> = record.sequences().map(|x| x.value()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn first_frame_set_nacks_preceding_gap() {
        let mut s = session();
        s.handle_datagram(frame_set(2, vec![plain_frame(b"a")]));
        let record = pending_nack_record(&mut s).expect("nack record");
        let values: Vec<u32> = record.sequences().map(|x| x.value()).collect();
        assert_eq!(values, vec![0, 1]);
    }

    #[test]
    fn duplicate_and_stale_sets_are_discarded() {
        let mut s = session();
        let payloads = s.handle_datagram(frame_set(1, vec![plain_frame(b"a")]));
        assert_eq!(payloads.len(), 1);
        assert!(s.handle_datagram(frame_set(1, vec![plain_frame(b"a")])).is_empty());
        assert!(s.handle_datagram(frame_set(0, vec![plain_frame(b"b")])).is_empty());
    }

    #[test]
    fn out_of_order_ordered_frames_are_buffered() {
        let mut s = session();
        let mut delivered = Vec::new();
        delivered.extend(s.handle_datagram(frame_set(0, vec![ordered_frame(0, b"0")])));
        delivered.extend(s.handle_datagram(frame_set(1, vec![ordered_frame(2, b"2")])));
        delivered.extend(s.handle_datagram(frame_set(2, vec![ordered_frame(1, b"1")])));

        let texts: Vec<&[u8]> = delivered.iter().map(|b| b.as_ref()).collect();
        assert_eq!(texts, vec![b"0".as_ref(), b"1".as_ref(), b"2".as_ref()]);
    }

    #[test]
    fn stale_ordered_frame_is_dropped() {
        let mut s = session();
        s.handle_datagram(frame_set(0, vec![ordered_frame(0, b"0")]));
        let delivered = s.handle_datagram(frame_set(1, vec![ordered_frame(0, b"dup")]));
        assert!(delivered.is_empty());
    }

    #[test]
    fn fragments_reassemble_out_of_order() {
        let mut s = session();
        let chunks: [&'static [u8]; 4] = [b"AAAA", b"BBBB", b"CCCC", b"DD"];
        let make = |index: u32| Frame {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(Sequence24::new(index)),
            sequence_index: None,
            order_index: Some(Sequence24::ZERO),
            order_channel: Some(0),
            fragment: Some(FragmentInfo {
                size: 4,
                id: 42,
                index,
            }),
            payload: Bytes::from_static(chunks[index as usize]),
        };

        let mut delivered = Vec::new();
        for (set_seq, index) in [(0u32, 2u32), (1, 0), (2, 3), (3, 1)] {
            delivered.extend(s.handle_datagram(frame_set(set_seq, vec![make(index)])));
        }

        assert_eq!(delivered.len(), 1);
        assert_eq!(&delivered[0][..], b"AAAABBBBCCCCDD");
    }

    #[test]
    fn duplicate_fragment_part_is_ignored() {
        let mut s = session();
        let make = |index: u32| Frame {
            reliability: Reliability::Reliable,
            reliable_index: Some(Sequence24::new(index)),
            sequence_index: None,
            order_index: None,
            order_channel: None,
            fragment: Some(FragmentInfo {
                size: 2,
                id: 7,
                index,
            }),
            payload: Bytes::from_static(b"xx"),
        };
        assert!(s.handle_datagram(frame_set(0, vec![make(0)])).is_empty());
        assert!(s.handle_datagram(frame_set(1, vec![make(0)])).is_empty());
        let delivered = s.handle_datagram(frame_set(2, vec![make(1)]));
        assert_eq!(delivered.len(), 1);
        assert_eq!(&delivered[0][..], b"xxxx");
    }

    #[test]
    fn unordered_payloads_pass_straight_through() {
        let mut s = session();
        let delivered = s.handle_datagram(frame_set(0, vec![plain_frame(b"hello")]));
        assert_eq!(delivered.len(), 1);
        assert_eq!(&delivered[0][..], b"hello");
    }
}
