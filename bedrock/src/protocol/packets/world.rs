//! World entry and dimension packets.

use bytes::{Buf, BufMut};

use crate::protocol::types::{BlockPos, Remainder, VarInt32, VarInt64, VarUInt64, Vec2, Vec3};
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// The packet that moves a session from login to the world. Only the head of
/// the packet is modelled; the long settings tail is carried raw.
#[derive(Debug, Clone, Default)]
pub struct StartGame {
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub player_gamemode: i32,
    pub position: Vec3,
    pub rotation: Vec2,
    pub seed: u64,
    pub dimension: i32,
    pub generator: i32,
    pub world_gamemode: i32,
    pub difficulty: i32,
    pub spawn_position: BlockPos,
    pub world_name: String,
    pub settings: Remainder,
}

impl ProtoEncode for StartGame {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt64(self.entity_unique_id).proto_encode(dst);
        VarUInt64(self.entity_runtime_id).proto_encode(dst);
        VarInt32(self.player_gamemode).proto_encode(dst);
        self.position.proto_encode(dst);
        self.rotation.proto_encode(dst);
        self.seed.proto_encode(dst);
        VarInt32(self.dimension).proto_encode(dst);
        VarInt32(self.generator).proto_encode(dst);
        VarInt32(self.world_gamemode).proto_encode(dst);
        VarInt32(self.difficulty).proto_encode(dst);
        self.spawn_position.proto_encode(dst);
        self.world_name.proto_encode(dst);
        self.settings.proto_encode(dst);
    }
}

impl ProtoDecode for StartGame {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_unique_id: VarInt64::proto_decode(src)?.0,
            entity_runtime_id: VarUInt64::proto_decode(src)?.0,
            player_gamemode: VarInt32::proto_decode(src)?.0,
            position: Vec3::proto_decode(src)?,
            rotation: Vec2::proto_decode(src)?,
            seed: u64::proto_decode(src)?,
            dimension: VarInt32::proto_decode(src)?.0,
            generator: VarInt32::proto_decode(src)?.0,
            world_gamemode: VarInt32::proto_decode(src)?.0,
            difficulty: VarInt32::proto_decode(src)?.0,
            spawn_position: BlockPos::proto_decode(src)?,
            world_name: String::proto_decode(src)?,
            settings: Remainder::proto_decode(src)?,
        })
    }
}

/// Requested view distance in chunks.
#[derive(Debug, Clone)]
pub struct RequestChunkRadius {
    pub radius: i32,
    pub max_radius: u8,
}

impl ProtoEncode for RequestChunkRadius {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt32(self.radius).proto_encode(dst);
        self.max_radius.proto_encode(dst);
    }
}

impl ProtoDecode for RequestChunkRadius {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            radius: VarInt32::proto_decode(src)?.0,
            max_radius: u8::proto_decode(src)?,
        })
    }
}

/// The radius the server actually granted.
#[derive(Debug, Clone)]
pub struct ChunkRadiusUpdated {
    pub radius: i32,
}

impl ProtoEncode for ChunkRadiusUpdated {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt32(self.radius).proto_encode(dst);
    }
}

impl ProtoDecode for ChunkRadiusUpdated {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            radius: VarInt32::proto_decode(src)?.0,
        })
    }
}

/// Server moved the player to another dimension; must be acknowledged with a
/// `PlayerAction` before the tick loop resumes input.
#[derive(Debug, Clone)]
pub struct ChangeDimension {
    pub dimension: i32,
    pub position: Vec3,
    pub respawn: bool,
}

impl ProtoEncode for ChangeDimension {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt32(self.dimension).proto_encode(dst);
        self.position.proto_encode(dst);
        self.respawn.proto_encode(dst);
    }
}

impl ProtoDecode for ChangeDimension {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            dimension: VarInt32::proto_decode(src)?.0,
            position: Vec3::proto_decode(src)?,
            respawn: bool::proto_decode(src)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetPlayerGameType {
    pub gamemode: i32,
}

impl ProtoEncode for SetPlayerGameType {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt32(self.gamemode).proto_encode(dst);
    }
}

impl ProtoDecode for SetPlayerGameType {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            gamemode: VarInt32::proto_decode(src)?.0,
        })
    }
}
