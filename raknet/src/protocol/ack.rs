use bytes::{Buf, BufMut};

use crate::protocol::constants::MAX_ACK_RANGES;
use crate::protocol::types::Sequence24;
use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// Inclusive run of frame set sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    pub start: Sequence24,
    pub end: Sequence24,
}

impl SequenceRange {
    pub fn single(sequence: Sequence24) -> Self {
        Self {
            start: sequence,
            end: sequence,
        }
    }
}

/// ACK or NACK payload: a run-length encoded list of sequence ranges.
///
/// On the wire: a 16-bit record count, then per record a "single" flag
/// byte, the starting sequence, and the inclusive end when the run spans
/// more than one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRecord {
    pub ranges: Vec<SequenceRange>,
}

impl AckRecord {
    /// Fold raw sequence values into inclusive runs. The input does not
    /// have to be sorted or deduplicated; runs come out in numeric order,
    /// so none of them wraps the 24-bit space.
    pub fn from_sequences(mut sequences: Vec<u32>) -> Self {
        sequences.sort_unstable();
        sequences.dedup();

        let mut ranges: Vec<SequenceRange> = Vec::new();
        for value in sequences {
            let extends_open_run = ranges
                .last()
                .is_some_and(|run| run.end.value() + 1 == value);
            if extends_open_run {
                if let Some(run) = ranges.last_mut() {
                    run.end = Sequence24::new(value);
                }
            } else {
                ranges.push(SequenceRange::single(Sequence24::new(value)));
            }
        }
        AckRecord { ranges }
    }

    /// Iterate every sequence number covered by the record.
    pub fn sequences(&self) -> impl Iterator<Item = Sequence24> + '_ {
        self.ranges.iter().flat_map(|range| {
            let mut sequence = range.start;
            let count = range.start.distance_to(range.end) + 1;
            (0..count).map(move |_| {
                let current = sequence;
                sequence = sequence.next();
                current
            })
        })
    }
}

impl RaknetEncodable for AckRecord {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        (self.ranges.len() as u16).encode_raknet(dst)?;
        for run in &self.ranges {
            let single = run.start == run.end;
            single.encode_raknet(dst)?;
            run.start.encode_raknet(dst)?;
            if !single {
                run.end.encode_raknet(dst)?;
            }
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let count = u16::decode_raknet(src)?;
        if count > MAX_ACK_RANGES {
            return Err(DecodeError::InvalidAckRecord);
        }

        let mut ranges = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let single = bool::decode_raknet(src)?;
            let start = Sequence24::decode_raknet(src)?;
            let end = if single {
                start
            } else {
                Sequence24::decode_raknet(src)?
            };
            ranges.push(SequenceRange { start, end });
        }
        Ok(AckRecord { ranges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn folds_unsorted_input_into_runs() {
        let record = AckRecord::from_sequences(vec![12, 3, 4, 4, 5, 9]);
        assert_eq!(
            record.ranges,
            vec![
                SequenceRange {
                    start: Sequence24::new(3),
                    end: Sequence24::new(5),
                },
                SequenceRange::single(Sequence24::new(9)),
                SequenceRange::single(Sequence24::new(12)),
            ]
        );
    }

    #[test]
    fn sequences_walks_every_member_in_order() {
        let record = AckRecord::from_sequences(vec![20, 6, 7, 8]);
        let values: Vec<u32> = record.sequences().map(|s| s.value()).collect();
        assert_eq!(values, vec![6, 7, 8, 20]);
    }

    #[test]
    fn wire_layout_of_a_singleton_and_a_run() {
        let record = AckRecord::from_sequences(vec![3, 10, 11, 12, 13]);
        let mut buf = BytesMut::new();
        record.encode_raknet(&mut buf).unwrap();

        let expected: &[u8] = &[
            0x00, 0x02, // two records
            0x01, 0x03, 0x00, 0x00, // singleton run at 3
            0x00, 0x0A, 0x00, 0x00, 0x0D, 0x00, 0x00, // run 10..=13
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn decodes_a_hand_built_record() {
        let raw: &[u8] = &[
            0x00, 0x02, // two records
            0x00, 0x20, 0x00, 0x00, 0x22, 0x00, 0x00, // run 0x20..=0x22
            0x01, 0x40, 0x00, 0x00, // singleton 0x40
        ];
        let mut slice = Bytes::copy_from_slice(raw);
        let record = AckRecord::decode_raknet(&mut slice).unwrap();
        let values: Vec<u32> = record.sequences().map(|s| s.value()).collect();
        assert_eq!(values, vec![0x20, 0x21, 0x22, 0x40]);
    }

    #[test]
    fn roundtrip() {
        let record = AckRecord::from_sequences(vec![0, 1, 2, 7, 8, 100]);
        let mut buf = BytesMut::new();
        record.encode_raknet(&mut buf).unwrap();
        let mut slice = buf.freeze();
        assert_eq!(AckRecord::decode_raknet(&mut slice).unwrap(), record);
    }

    #[test]
    fn absurd_record_counts_are_rejected() {
        let mut slice = Bytes::from_static(&[0xFF, 0xFF]);
        assert!(matches!(
            AckRecord::decode_raknet(&mut slice),
            Err(DecodeError::InvalidAckRecord)
        ));
    }
}
