use bytes::{Buf, BufMut};
use std::sync::OnceLock;
use std::time::Instant;

use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// The process-wide epoch RakNet timestamps are measured against.
pub fn raknet_start_time() -> Instant {
    *START_TIME.get_or_init(Instant::now)
}

/// Milliseconds since [`raknet_start_time`], as used on the wire in the
/// connection and ping/pong packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaknetTime(pub u64);

impl RaknetTime {
    pub fn now() -> Self {
        RaknetTime(raknet_start_time().elapsed().as_millis() as u64)
    }
}

impl RaknetEncodable for RaknetTime {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.0.encode_raknet(dst)
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode_raknet(src)?))
    }
}
