//! Network negotiation, login and status packets.

use bytes::{Buf, BufMut};

use crate::protocol::types::{Remainder, VarUInt32};
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// First game packet on the wire; asks the server for its compression
/// settings. The protocol version is big-endian, unlike the rest of the
/// game protocol.
#[derive(Debug, Clone)]
pub struct RequestNetworkSettings {
    pub client_protocol: i32,
}

impl ProtoEncode for RequestNetworkSettings {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.client_protocol);
    }
}

impl ProtoDecode for RequestNetworkSettings {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        if src.remaining() < 4 {
            return Err(ProtoError::UnexpectedEof);
        }
        Ok(Self {
            client_protocol: src.get_i32(),
        })
    }
}

/// The server's compression parameters. Receiving this flips the session
/// into compressed-batch mode.
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub compression_threshold: u16,
    pub compression_algorithm: u16,
    pub client_throttle_enabled: bool,
    pub client_throttle_threshold: u8,
    pub client_throttle_scalar: f32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            compression_threshold: 256,
            compression_algorithm: 0,
            client_throttle_enabled: false,
            client_throttle_threshold: 0,
            client_throttle_scalar: 0.0,
        }
    }
}

impl ProtoEncode for NetworkSettings {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.compression_threshold.proto_encode(dst);
        self.compression_algorithm.proto_encode(dst);
        self.client_throttle_enabled.proto_encode(dst);
        self.client_throttle_threshold.proto_encode(dst);
        self.client_throttle_scalar.proto_encode(dst);
    }
}

impl ProtoDecode for NetworkSettings {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            compression_threshold: u16::proto_decode(src)?,
            compression_algorithm: u16::proto_decode(src)?,
            client_throttle_enabled: bool::proto_decode(src)?,
            client_throttle_threshold: u8::proto_decode(src)?,
            client_throttle_scalar: f32::proto_decode(src)?,
        })
    }
}

/// The identity presentation: the signed chain JSON and the user-properties
/// JWT, wrapped in the connection-request blob.
#[derive(Debug, Clone)]
pub struct Login {
    pub client_protocol: i32,
    /// JSON document of the form `{"chain":[...]}`.
    pub identity_chain: String,
    /// The user-chain JWT in compact form.
    pub user_chain: String,
}

impl ProtoEncode for Login {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.client_protocol);
        let blob_len = 4 + self.identity_chain.len() + 4 + self.user_chain.len();
        VarUInt32(blob_len as u32).proto_encode(dst);
        dst.put_u32_le(self.identity_chain.len() as u32);
        dst.put_slice(self.identity_chain.as_bytes());
        dst.put_u32_le(self.user_chain.len() as u32);
        dst.put_slice(self.user_chain.as_bytes());
    }
}

impl ProtoDecode for Login {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        if src.remaining() < 4 {
            return Err(ProtoError::UnexpectedEof);
        }
        let client_protocol = src.get_i32();
        let _blob_len = VarUInt32::proto_decode(src)?;
        let identity_chain = read_le_string(src)?;
        let user_chain = read_le_string(src)?;
        Ok(Self {
            client_protocol,
            identity_chain,
            user_chain,
        })
    }
}

fn read_le_string(src: &mut impl Buf) -> Result<String, ProtoError> {
    let len = u32::proto_decode(src)? as usize;
    if src.remaining() < len {
        return Err(ProtoError::LengthOutOfBounds { len });
    }
    let raw = src.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}

/// Login/spawn progress markers, big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatusType {
    LoginSuccess,
    FailedClientOutdated,
    FailedServerOutdated,
    PlayerSpawn,
    FailedInvalidTenant,
    FailedVanillaEdu,
    FailedIncompatibleEduVanilla,
    FailedServerFull,
    Unknown(i32),
}

impl PlayStatusType {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => PlayStatusType::LoginSuccess,
            1 => PlayStatusType::FailedClientOutdated,
            2 => PlayStatusType::FailedServerOutdated,
            3 => PlayStatusType::PlayerSpawn,
            4 => PlayStatusType::FailedInvalidTenant,
            5 => PlayStatusType::FailedVanillaEdu,
            6 => PlayStatusType::FailedIncompatibleEduVanilla,
            7 => PlayStatusType::FailedServerFull,
            other => PlayStatusType::Unknown(other),
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            PlayStatusType::LoginSuccess => 0,
            PlayStatusType::FailedClientOutdated => 1,
            PlayStatusType::FailedServerOutdated => 2,
            PlayStatusType::PlayerSpawn => 3,
            PlayStatusType::FailedInvalidTenant => 4,
            PlayStatusType::FailedVanillaEdu => 5,
            PlayStatusType::FailedIncompatibleEduVanilla => 6,
            PlayStatusType::FailedServerFull => 7,
            PlayStatusType::Unknown(other) => other,
        }
    }

    /// The failure set that aborts a login.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            PlayStatusType::FailedClientOutdated
                | PlayStatusType::FailedServerOutdated
                | PlayStatusType::FailedVanillaEdu
                | PlayStatusType::FailedIncompatibleEduVanilla
                | PlayStatusType::FailedServerFull
                | PlayStatusType::Unknown(_)
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            PlayStatusType::LoginSuccess => "login success",
            PlayStatusType::FailedClientOutdated => "client outdated",
            PlayStatusType::FailedServerOutdated => "server outdated",
            PlayStatusType::PlayerSpawn => "player spawn",
            PlayStatusType::FailedInvalidTenant => "invalid tenant",
            PlayStatusType::FailedVanillaEdu => "vanilla client on education server",
            PlayStatusType::FailedIncompatibleEduVanilla => "education client on vanilla server",
            PlayStatusType::FailedServerFull => "server full",
            PlayStatusType::Unknown(_) => "unknown status",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayStatus {
    pub status: PlayStatusType,
}

impl ProtoEncode for PlayStatus {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.status.to_i32());
    }
}

impl ProtoDecode for PlayStatus {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        if src.remaining() < 4 {
            return Err(ProtoError::UnexpectedEof);
        }
        Ok(Self {
            status: PlayStatusType::from_i32(src.get_i32()),
        })
    }
}

/// Server-initiated disconnect with an optional on-screen message.
#[derive(Debug, Clone)]
pub struct Disconnect {
    pub hide_disconnect_screen: bool,
    pub message: String,
}

impl ProtoEncode for Disconnect {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.hide_disconnect_screen.proto_encode(dst);
        if !self.hide_disconnect_screen {
            self.message.proto_encode(dst);
        }
    }
}

impl ProtoDecode for Disconnect {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        // Newer revisions prepend a varint reason code.
        let hide_disconnect_screen = bool::proto_decode(src)?;
        let message = if hide_disconnect_screen || !src.has_remaining() {
            String::new()
        } else {
            String::proto_decode(src)?
        };
        let _tail = Remainder::proto_decode(src)?;
        Ok(Self {
            hide_disconnect_screen,
            message,
        })
    }
}
