//! Resource pack negotiation packets.
//!
//! The client declines all packs, so the server-side listings are kept as
//! raw tails; only the response status matters.

use bytes::{Buf, BufMut};

use crate::protocol::types::Remainder;
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// Listing of the packs the server offers.
#[derive(Debug, Clone)]
pub struct ResourcePacksInfo {
    pub texture_pack_required: bool,
    pub listing: Remainder,
}

impl ProtoDecode for ResourcePacksInfo {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            texture_pack_required: bool::proto_decode(src)?,
            listing: Remainder::proto_decode(src)?,
        })
    }
}

impl ProtoEncode for ResourcePacksInfo {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.texture_pack_required.proto_encode(dst);
        self.listing.proto_encode(dst);
    }
}

/// The server's final pack application order.
#[derive(Debug, Clone)]
pub struct ResourcePackStack {
    pub must_accept: bool,
    pub listing: Remainder,
}

impl ProtoDecode for ResourcePackStack {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            must_accept: bool::proto_decode(src)?,
            listing: Remainder::proto_decode(src)?,
        })
    }
}

impl ProtoEncode for ResourcePackStack {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.must_accept.proto_encode(dst);
        self.listing.proto_encode(dst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePackResponseStatus {
    None,
    Refused,
    SendPacks,
    HaveAllPacks,
    Completed,
}

impl ResourcePackResponseStatus {
    fn to_u8(self) -> u8 {
        match self {
            ResourcePackResponseStatus::None => 0,
            ResourcePackResponseStatus::Refused => 1,
            ResourcePackResponseStatus::SendPacks => 2,
            ResourcePackResponseStatus::HaveAllPacks => 3,
            ResourcePackResponseStatus::Completed => 4,
        }
    }

    fn from_u8(value: u8) -> Result<Self, ProtoError> {
        Ok(match value {
            0 => ResourcePackResponseStatus::None,
            1 => ResourcePackResponseStatus::Refused,
            2 => ResourcePackResponseStatus::SendPacks,
            3 => ResourcePackResponseStatus::HaveAllPacks,
            4 => ResourcePackResponseStatus::Completed,
            other => {
                return Err(ProtoError::InvalidEnum {
                    what: "resource pack response status",
                    value: other as u64,
                })
            }
        })
    }
}

/// The client's answer during pack negotiation; this client always responds
/// with an empty pack list.
#[derive(Debug, Clone)]
pub struct ResourcePackClientResponse {
    pub status: ResourcePackResponseStatus,
    pub pack_ids: Vec<String>,
}

impl ResourcePackClientResponse {
    pub fn have_all_packs() -> Self {
        Self {
            status: ResourcePackResponseStatus::HaveAllPacks,
            pack_ids: Vec::new(),
        }
    }

    pub fn completed() -> Self {
        Self {
            status: ResourcePackResponseStatus::Completed,
            pack_ids: Vec::new(),
        }
    }
}

impl ProtoEncode for ResourcePackClientResponse {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.status.to_u8().proto_encode(dst);
        (self.pack_ids.len() as u16).proto_encode(dst);
        for pack_id in &self.pack_ids {
            pack_id.proto_encode(dst);
        }
    }
}

impl ProtoDecode for ResourcePackClientResponse {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let status = ResourcePackResponseStatus::from_u8(u8::proto_decode(src)?)?;
        let count = u16::proto_decode(src)? as usize;
        let mut pack_ids = Vec::with_capacity(count);
        for _ in 0..count {
            pack_ids.push(String::proto_decode(src)?);
        }
        Ok(Self { status, pack_ids })
    }
}
