//! Chat, commands, forms and latency probes.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::protocol::types::{VarInt32, VarInt64, VarUInt32};
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

pub mod text_type {
    pub const RAW: u8 = 0;
    pub const CHAT: u8 = 1;
    pub const TRANSLATE: u8 = 2;
    pub const POPUP: u8 = 3;
    pub const JUKEBOX_POPUP: u8 = 4;
    pub const TIP: u8 = 5;
    pub const SYSTEM: u8 = 6;
    pub const WHISPER: u8 = 7;
    pub const ANNOUNCEMENT: u8 = 8;
}

/// Chat and system text. The source name is present only for chat-like
/// types; translate-like types carry parameters.
#[derive(Debug, Clone, Default)]
pub struct Text {
    pub text_type: u8,
    pub needs_translation: bool,
    pub source_name: String,
    pub message: String,
    pub parameters: Vec<String>,
    pub xuid: String,
    pub platform_chat_id: String,
}

impl Text {
    pub fn chat(source_name: impl Into<String>, message: impl Into<String>, xuid: impl Into<String>) -> Self {
        Self {
            text_type: text_type::CHAT,
            source_name: source_name.into(),
            message: message.into(),
            xuid: xuid.into(),
            ..Default::default()
        }
    }

    fn has_source(text_type: u8) -> bool {
        matches!(
            text_type,
            text_type::CHAT | text_type::WHISPER | text_type::ANNOUNCEMENT
        )
    }

    fn has_parameters(text_type: u8) -> bool {
        matches!(
            text_type,
            text_type::TRANSLATE | text_type::POPUP | text_type::JUKEBOX_POPUP
        )
    }
}

impl ProtoEncode for Text {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.text_type.proto_encode(dst);
        self.needs_translation.proto_encode(dst);
        if Self::has_source(self.text_type) {
            self.source_name.proto_encode(dst);
        }
        self.message.proto_encode(dst);
        if Self::has_parameters(self.text_type) {
            VarUInt32(self.parameters.len() as u32).proto_encode(dst);
            for parameter in &self.parameters {
                parameter.proto_encode(dst);
            }
        }
        self.xuid.proto_encode(dst);
        self.platform_chat_id.proto_encode(dst);
    }
}

impl ProtoDecode for Text {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let text_type = u8::proto_decode(src)?;
        let needs_translation = bool::proto_decode(src)?;
        let source_name = if Self::has_source(text_type) {
            String::proto_decode(src)?
        } else {
            String::new()
        };
        let message = String::proto_decode(src)?;
        let parameters = if Self::has_parameters(text_type) {
            let count = VarUInt32::proto_decode(src)?.0 as usize;
            let mut parameters = Vec::with_capacity(count.min(32));
            for _ in 0..count {
                parameters.push(String::proto_decode(src)?);
            }
            parameters
        } else {
            Vec::new()
        };
        let xuid = String::proto_decode(src)?;
        let platform_chat_id = String::proto_decode(src)?;
        Ok(Self {
            text_type,
            needs_translation,
            source_name,
            message,
            parameters,
            xuid,
            platform_chat_id,
        })
    }
}

pub mod command_origin {
    pub const PLAYER: u32 = 0;
}

#[derive(Debug, Clone)]
pub struct CommandOrigin {
    pub origin_type: u32,
    pub uuid: Uuid,
    pub request_id: String,
    pub player_unique_id: i64,
}

impl ProtoEncode for CommandOrigin {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt32(self.origin_type).proto_encode(dst);
        self.uuid.proto_encode(dst);
        self.request_id.proto_encode(dst);
        VarInt64(self.player_unique_id).proto_encode(dst);
    }
}

impl ProtoDecode for CommandOrigin {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            origin_type: VarUInt32::proto_decode(src)?.0,
            uuid: Uuid::proto_decode(src)?,
            request_id: String::proto_decode(src)?,
            player_unique_id: VarInt64::proto_decode(src)?.0,
        })
    }
}

/// A slash command issued by the player.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub origin: CommandOrigin,
    pub internal: bool,
    pub version: i32,
}

impl ProtoEncode for CommandRequest {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.command.proto_encode(dst);
        self.origin.proto_encode(dst);
        self.internal.proto_encode(dst);
        VarInt32(self.version).proto_encode(dst);
    }
}

impl ProtoDecode for CommandRequest {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            command: String::proto_decode(src)?,
            origin: CommandOrigin::proto_decode(src)?,
            internal: bool::proto_decode(src)?,
            version: VarInt32::proto_decode(src)?.0,
        })
    }
}

/// Server pushing a form (JSON payload) at the client.
#[derive(Debug, Clone)]
pub struct ModalFormRequest {
    pub form_id: u32,
    pub form_data: String,
}

impl ProtoEncode for ModalFormRequest {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt32(self.form_id).proto_encode(dst);
        self.form_data.proto_encode(dst);
    }
}

impl ProtoDecode for ModalFormRequest {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            form_id: VarUInt32::proto_decode(src)?.0,
            form_data: String::proto_decode(src)?,
        })
    }
}

pub mod form_cancel_reason {
    pub const USER_CLOSED: u8 = 0;
    pub const USER_BUSY: u8 = 1;
}

/// The player's answer to a form; `None` response data means cancelled.
#[derive(Debug, Clone)]
pub struct ModalFormResponse {
    pub form_id: u32,
    pub response_data: Option<String>,
    pub cancel_reason: Option<u8>,
}

impl ModalFormResponse {
    pub fn answered(form_id: u32, data: String) -> Self {
        Self {
            form_id,
            response_data: Some(data),
            cancel_reason: None,
        }
    }

    pub fn cancelled(form_id: u32) -> Self {
        Self {
            form_id,
            response_data: None,
            cancel_reason: Some(form_cancel_reason::USER_CLOSED),
        }
    }
}

impl ProtoEncode for ModalFormResponse {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt32(self.form_id).proto_encode(dst);
        self.response_data.is_some().proto_encode(dst);
        if let Some(data) = &self.response_data {
            data.proto_encode(dst);
        }
        self.cancel_reason.is_some().proto_encode(dst);
        if let Some(reason) = self.cancel_reason {
            reason.proto_encode(dst);
        }
    }
}

impl ProtoDecode for ModalFormResponse {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let form_id = VarUInt32::proto_decode(src)?.0;
        let response_data = if bool::proto_decode(src)? {
            Some(String::proto_decode(src)?)
        } else {
            None
        };
        let cancel_reason = if bool::proto_decode(src)? {
            Some(u8::proto_decode(src)?)
        } else {
            None
        };
        Ok(Self {
            form_id,
            response_data,
            cancel_reason,
        })
    }
}

/// Marks the client as fully spawned-in after StartGame.
#[derive(Debug, Clone)]
pub struct SetLocalPlayerAsInitialized {
    pub runtime_entity_id: u64,
}

impl ProtoEncode for SetLocalPlayerAsInitialized {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        crate::protocol::types::VarUInt64(self.runtime_entity_id).proto_encode(dst);
    }
}

impl ProtoDecode for SetLocalPlayerAsInitialized {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: crate::protocol::types::VarUInt64::proto_decode(src)?.0,
        })
    }
}

/// Server latency probe; echoed with `from_server` cleared.
#[derive(Debug, Clone)]
pub struct NetworkStackLatency {
    pub timestamp: u64,
    pub from_server: bool,
}

impl ProtoEncode for NetworkStackLatency {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.timestamp.proto_encode(dst);
        self.from_server.proto_encode(dst);
    }
}

impl ProtoDecode for NetworkStackLatency {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            timestamp: u64::proto_decode(src)?,
            from_server: bool::proto_decode(src)?,
        })
    }
}
