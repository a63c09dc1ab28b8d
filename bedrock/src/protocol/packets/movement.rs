//! Movement and keep-alive packets.

use bytes::{Buf, BufMut};

use crate::protocol::types::{BlockPos, Remainder, VarInt32, VarUInt32, VarUInt64, Vec2, Vec3};
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// Server-authoritative player movement / teleport.
#[derive(Debug, Clone)]
pub struct MovePlayer {
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub mode: u8,
    pub on_ground: bool,
    pub ridden_runtime_id: u64,
    pub tail: Remainder,
}

pub mod move_mode {
    pub const NORMAL: u8 = 0;
    pub const RESET: u8 = 1;
    pub const TELEPORT: u8 = 2;
    pub const ROTATION: u8 = 3;
}

impl ProtoEncode for MovePlayer {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        self.position.proto_encode(dst);
        self.pitch.proto_encode(dst);
        self.yaw.proto_encode(dst);
        self.head_yaw.proto_encode(dst);
        self.mode.proto_encode(dst);
        self.on_ground.proto_encode(dst);
        VarUInt64(self.ridden_runtime_id).proto_encode(dst);
        self.tail.proto_encode(dst);
    }
}

impl ProtoDecode for MovePlayer {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            position: Vec3::proto_decode(src)?,
            pitch: f32::proto_decode(src)?,
            yaw: f32::proto_decode(src)?,
            head_yaw: f32::proto_decode(src)?,
            mode: u8::proto_decode(src)?,
            on_ground: bool::proto_decode(src)?,
            ridden_runtime_id: VarUInt64::proto_decode(src)?.0,
            tail: Remainder::proto_decode(src)?,
        })
    }
}

pub mod input_mode {
    pub const MOUSE: u32 = 1;
}

pub mod play_mode {
    pub const NORMAL: u32 = 0;
}

/// The per-tick client input report. Its absence makes the server time the
/// connection out.
#[derive(Debug, Clone)]
pub struct PlayerAuthInput {
    pub pitch: f32,
    pub yaw: f32,
    pub position: Vec3,
    pub move_vector: Vec2,
    pub head_yaw: f32,
    pub input_data: u64,
    pub input_mode: u32,
    pub play_mode: u32,
    pub tick: u64,
    pub position_delta: Vec3,
}

impl PlayerAuthInput {
    /// A stationary input frame at the given pose.
    pub fn idle(position: Vec3, pitch: f32, yaw: f32, head_yaw: f32, tick: u64) -> Self {
        Self {
            pitch,
            yaw,
            position,
            move_vector: Vec2::ZERO,
            head_yaw,
            input_data: 0,
            input_mode: input_mode::MOUSE,
            play_mode: play_mode::NORMAL,
            tick,
            position_delta: Vec3::ZERO,
        }
    }
}

impl ProtoEncode for PlayerAuthInput {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.pitch.proto_encode(dst);
        self.yaw.proto_encode(dst);
        self.position.proto_encode(dst);
        self.move_vector.proto_encode(dst);
        self.head_yaw.proto_encode(dst);
        VarUInt64(self.input_data).proto_encode(dst);
        VarUInt32(self.input_mode).proto_encode(dst);
        VarUInt32(self.play_mode).proto_encode(dst);
        VarUInt64(self.tick).proto_encode(dst);
        self.position_delta.proto_encode(dst);
    }
}

impl ProtoDecode for PlayerAuthInput {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            pitch: f32::proto_decode(src)?,
            yaw: f32::proto_decode(src)?,
            position: Vec3::proto_decode(src)?,
            move_vector: Vec2::proto_decode(src)?,
            head_yaw: f32::proto_decode(src)?,
            input_data: VarUInt64::proto_decode(src)?.0,
            input_mode: VarUInt32::proto_decode(src)?.0,
            play_mode: VarUInt32::proto_decode(src)?.0,
            tick: VarUInt64::proto_decode(src)?.0,
            position_delta: Vec3::proto_decode(src)?,
        })
    }
}

pub mod respawn_state {
    pub const SEARCHING_FOR_SPAWN: u8 = 0;
    pub const SERVER_READY_TO_SPAWN: u8 = 1;
    pub const CLIENT_READY_TO_SPAWN: u8 = 2;
}

/// Death/respawn negotiation; the client echoes the server's ready state.
#[derive(Debug, Clone)]
pub struct Respawn {
    pub position: Vec3,
    pub state: u8,
    pub runtime_entity_id: u64,
}

impl ProtoEncode for Respawn {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.position.proto_encode(dst);
        self.state.proto_encode(dst);
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
    }
}

impl ProtoDecode for Respawn {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            position: Vec3::proto_decode(src)?,
            state: u8::proto_decode(src)?,
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
        })
    }
}

pub mod player_action_type {
    pub const DIMENSION_CHANGE_ACK: i32 = 14;
}

/// Player world interaction; the client only emits the dimension-change
/// acknowledgement.
#[derive(Debug, Clone)]
pub struct PlayerAction {
    pub runtime_entity_id: u64,
    pub action: i32,
    pub position: BlockPos,
    pub result_position: BlockPos,
    pub face: i32,
}

impl PlayerAction {
    pub fn dimension_change_ack(runtime_entity_id: u64) -> Self {
        Self {
            runtime_entity_id,
            action: player_action_type::DIMENSION_CHANGE_ACK,
            position: BlockPos::ZERO,
            result_position: BlockPos::ZERO,
            face: 0,
        }
    }
}

impl ProtoEncode for PlayerAction {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        VarInt32(self.action).proto_encode(dst);
        self.position.proto_encode(dst);
        self.result_position.proto_encode(dst);
        VarInt32(self.face).proto_encode(dst);
    }
}

impl ProtoDecode for PlayerAction {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            action: VarInt32::proto_decode(src)?.0,
            position: BlockPos::proto_decode(src)?,
            result_position: BlockPos::proto_decode(src)?,
            face: VarInt32::proto_decode(src)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn auth_input_roundtrip() {
        let input = PlayerAuthInput::idle(Vec3::new(1.0, 64.0, -3.0), 10.0, 180.0, 180.0, 42);
        let mut buf = BytesMut::new();
        input.proto_encode(&mut buf);
        let mut slice = buf.freeze();
        let decoded = PlayerAuthInput::proto_decode(&mut slice).unwrap();
        assert_eq!(decoded.tick, 42);
        assert_eq!(decoded.position, input.position);
        assert_eq!(decoded.input_mode, input_mode::MOUSE);
        assert_eq!(decoded.move_vector, Vec2::ZERO);
    }

    #[test]
    fn dimension_ack_has_zeroed_positions() {
        let action = PlayerAction::dimension_change_ack(7);
        assert_eq!(action.action, player_action_type::DIMENSION_CHANGE_ACK);
        assert_eq!(action.position, BlockPos::ZERO);
        assert_eq!(action.face, 0);

        let mut buf = BytesMut::new();
        action.proto_encode(&mut buf);
        let mut slice = buf.freeze();
        let decoded = PlayerAction::proto_decode(&mut slice).unwrap();
        assert_eq!(decoded.runtime_entity_id, 7);
    }

    #[test]
    fn respawn_roundtrip() {
        let packet = Respawn {
            position: Vec3::new(0.0, 70.0, 0.0),
            state: respawn_state::SERVER_READY_TO_SPAWN,
            runtime_entity_id: 3,
        };
        let mut buf = BytesMut::new();
        packet.proto_encode(&mut buf);
        let mut slice = buf.freeze();
        let decoded = Respawn::proto_decode(&mut slice).unwrap();
        assert_eq!(decoded.state, respawn_state::SERVER_READY_TO_SPAWN);
    }
}
