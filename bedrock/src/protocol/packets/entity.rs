//! Entity tracking packets feeding the world mirror.

use bytes::{Buf, BufMut, Bytes};
use std::collections::HashMap;
use uuid::Uuid;

use crate::protocol::types::{Remainder, VarInt64, VarUInt32, VarUInt64, Vec3};
use crate::protocol::{ProtoDecode, ProtoEncode, ProtoError};

/// A remote player entering view. The held item, gamemode and ability tail
/// are not modelled.
#[derive(Debug, Clone)]
pub struct AddPlayer {
    pub uuid: Uuid,
    pub username: String,
    pub runtime_entity_id: u64,
    pub platform_chat_id: String,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub tail: Remainder,
}

impl ProtoEncode for AddPlayer {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.uuid.proto_encode(dst);
        self.username.proto_encode(dst);
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        self.platform_chat_id.proto_encode(dst);
        self.position.proto_encode(dst);
        self.motion.proto_encode(dst);
        self.pitch.proto_encode(dst);
        self.yaw.proto_encode(dst);
        self.head_yaw.proto_encode(dst);
        self.tail.proto_encode(dst);
    }
}

impl ProtoDecode for AddPlayer {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            uuid: Uuid::proto_decode(src)?,
            username: String::proto_decode(src)?,
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            platform_chat_id: String::proto_decode(src)?,
            position: Vec3::proto_decode(src)?,
            motion: Vec3::proto_decode(src)?,
            pitch: f32::proto_decode(src)?,
            yaw: f32::proto_decode(src)?,
            head_yaw: f32::proto_decode(src)?,
            tail: Remainder::proto_decode(src)?,
        })
    }
}

/// A non-player entity entering view.
#[derive(Debug, Clone)]
pub struct AddEntity {
    pub entity_unique_id: i64,
    pub runtime_entity_id: u64,
    pub entity_type: String,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub tail: Remainder,
}

impl ProtoEncode for AddEntity {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt64(self.entity_unique_id).proto_encode(dst);
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        self.entity_type.proto_encode(dst);
        self.position.proto_encode(dst);
        self.motion.proto_encode(dst);
        self.pitch.proto_encode(dst);
        self.yaw.proto_encode(dst);
        self.head_yaw.proto_encode(dst);
        self.tail.proto_encode(dst);
    }
}

impl ProtoDecode for AddEntity {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_unique_id: VarInt64::proto_decode(src)?.0,
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            entity_type: String::proto_decode(src)?,
            position: Vec3::proto_decode(src)?,
            motion: Vec3::proto_decode(src)?,
            pitch: f32::proto_decode(src)?,
            yaw: f32::proto_decode(src)?,
            head_yaw: f32::proto_decode(src)?,
            tail: Remainder::proto_decode(src)?,
        })
    }
}

/// Entity leaving view; keyed by unique id, not runtime id.
#[derive(Debug, Clone)]
pub struct RemoveEntity {
    pub entity_unique_id: i64,
}

impl ProtoEncode for RemoveEntity {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarInt64(self.entity_unique_id).proto_encode(dst);
    }
}

impl ProtoDecode for RemoveEntity {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_unique_id: VarInt64::proto_decode(src)?.0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetEntityMotion {
    pub runtime_entity_id: u64,
    pub motion: Vec3,
}

impl ProtoEncode for SetEntityMotion {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        self.motion.proto_encode(dst);
    }
}

impl ProtoDecode for SetEntityMotion {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            motion: Vec3::proto_decode(src)?,
        })
    }
}

/// Absolute entity movement with byte-quantised angles.
#[derive(Debug, Clone)]
pub struct MoveEntity {
    pub runtime_entity_id: u64,
    pub flags: u8,
    pub position: Vec3,
    pub pitch: u8,
    pub yaw: u8,
    pub head_yaw: u8,
}

impl MoveEntity {
    /// Angles travel as 1/256th of a full turn.
    pub fn angle(degrees_byte: u8) -> f32 {
        degrees_byte as f32 * (360.0 / 256.0)
    }
}

impl ProtoEncode for MoveEntity {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        self.flags.proto_encode(dst);
        self.position.proto_encode(dst);
        self.pitch.proto_encode(dst);
        self.yaw.proto_encode(dst);
        self.head_yaw.proto_encode(dst);
    }
}

impl ProtoDecode for MoveEntity {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            flags: u8::proto_decode(src)?,
            position: Vec3::proto_decode(src)?,
            pitch: u8::proto_decode(src)?,
            yaw: u8::proto_decode(src)?,
            head_yaw: u8::proto_decode(src)?,
        })
    }
}

/// One decoded metadata value. NBT-typed entries stop the parse; everything
/// from that entry on is kept raw.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(u8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Long(i64),
    Vec3(Vec3),
}

/// Entity metadata map. Parsing is best-effort: entries with value types the
/// client cannot skip (item NBT) leave the remainder in `raw_tail`.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadata {
    pub entries: HashMap<u32, MetadataValue>,
    pub raw_tail: Bytes,
}

impl ProtoDecode for EntityMetadata {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let count = VarUInt32::proto_decode(src)?.0;
        let mut entries = HashMap::new();
        for _ in 0..count {
            let key = VarUInt32::proto_decode(src)?.0;
            let kind = VarUInt32::proto_decode(src)?.0;
            let value = match kind {
                0 => MetadataValue::Byte(u8::proto_decode(src)?),
                1 => {
                    if src.remaining() < 2 {
                        return Err(ProtoError::UnexpectedEof);
                    }
                    MetadataValue::Short(src.get_i16_le())
                }
                2 => MetadataValue::Int(crate::protocol::types::VarInt32::proto_decode(src)?.0),
                3 => MetadataValue::Float(f32::proto_decode(src)?),
                4 => MetadataValue::String(String::proto_decode(src)?),
                7 => MetadataValue::Long(crate::protocol::types::VarInt64::proto_decode(src)?.0),
                8 => MetadataValue::Vec3(Vec3::proto_decode(src)?),
                _ => {
                    // Opaque value (item NBT, block pos...); cannot be skipped
                    // reliably, so keep whatever is left as a raw tail.
                    let len = src.remaining();
                    return Ok(Self {
                        entries,
                        raw_tail: src.copy_to_bytes(len),
                    });
                }
            };
            entries.insert(key, value);
        }
        Ok(Self {
            entries,
            raw_tail: Bytes::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetEntityData {
    pub runtime_entity_id: u64,
    pub metadata: EntityMetadata,
}

impl ProtoDecode for SetEntityData {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            runtime_entity_id: VarUInt64::proto_decode(src)?.0,
            metadata: EntityMetadata::proto_decode(src)?,
        })
    }
}

/// One attribute row of an `UpdateAttributes` packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub min: f32,
    pub max: f32,
    pub current: f32,
    pub default: f32,
    pub name: String,
}

impl ProtoEncode for Attribute {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        self.min.proto_encode(dst);
        self.max.proto_encode(dst);
        self.current.proto_encode(dst);
        self.default.proto_encode(dst);
        self.name.proto_encode(dst);
        VarUInt32(0).proto_encode(dst); // modifier count
    }
}

impl ProtoDecode for Attribute {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let attribute = Self {
            min: f32::proto_decode(src)?,
            max: f32::proto_decode(src)?,
            current: f32::proto_decode(src)?,
            default: f32::proto_decode(src)?,
            name: String::proto_decode(src)?,
        };
        let modifiers = VarUInt32::proto_decode(src)?.0;
        if modifiers != 0 {
            // Modifiers are not modelled; their presence poisons the rest of
            // the packet for this client.
            return Err(ProtoError::InvalidEnum {
                what: "attribute modifier count",
                value: modifiers as u64,
            });
        }
        Ok(attribute)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateAttributes {
    pub runtime_entity_id: u64,
    pub attributes: Vec<Attribute>,
    pub tick: u64,
}

impl ProtoEncode for UpdateAttributes {
    fn proto_encode(&self, dst: &mut impl BufMut) {
        VarUInt64(self.runtime_entity_id).proto_encode(dst);
        VarUInt32(self.attributes.len() as u32).proto_encode(dst);
        for attribute in &self.attributes {
            attribute.proto_encode(dst);
        }
        VarUInt64(self.tick).proto_encode(dst);
    }
}

impl ProtoDecode for UpdateAttributes {
    fn proto_decode(src: &mut impl Buf) -> Result<Self, ProtoError> {
        let runtime_entity_id = VarUInt64::proto_decode(src)?.0;
        let count = VarUInt32::proto_decode(src)?.0 as usize;
        let mut attributes = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            attributes.push(Attribute::proto_decode(src)?);
        }
        let tick = VarUInt64::proto_decode(src)?.0;
        Ok(Self {
            runtime_entity_id,
            attributes,
            tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn add_player_roundtrip() {
        let packet = AddPlayer {
            uuid: Uuid::from_u128(7),
            username: "Steve".to_string(),
            runtime_entity_id: 12,
            platform_chat_id: String::new(),
            position: Vec3::new(1.0, 64.0, 1.0),
            motion: Vec3::ZERO,
            pitch: 0.0,
            yaw: 90.0,
            head_yaw: 90.0,
            tail: Remainder(Bytes::from_static(b"item+meta")),
        };
        let mut buf = BytesMut::new();
        packet.proto_encode(&mut buf);
        let mut slice = buf.freeze();
        let decoded = AddPlayer::proto_decode(&mut slice).unwrap();
        assert_eq!(decoded.username, "Steve");
        assert_eq!(decoded.runtime_entity_id, 12);
        assert_eq!(decoded.uuid, Uuid::from_u128(7));
    }

    #[test]
    fn update_attributes_roundtrip() {
        let packet = UpdateAttributes {
            runtime_entity_id: 2,
            attributes: vec![Attribute {
                min: 0.0,
                max: 20.0,
                current: 17.0,
                default: 20.0,
                name: "minecraft:health".to_string(),
            }],
            tick: 99,
        };
        let mut buf = BytesMut::new();
        packet.proto_encode(&mut buf);
        let mut slice = buf.freeze();
        let decoded = UpdateAttributes::proto_decode(&mut slice).unwrap();
        assert_eq!(decoded.attributes.len(), 1);
        assert_eq!(decoded.attributes[0].current, 17.0);
        assert_eq!(decoded.tick, 99);
    }

    #[test]
    fn metadata_parses_known_types_and_keeps_opaque_tail() {
        let mut buf = BytesMut::new();
        VarUInt32(2).proto_encode(&mut buf);
        // key 0, type float
        VarUInt32(0).proto_encode(&mut buf);
        VarUInt32(3).proto_encode(&mut buf);
        1.5f32.proto_encode(&mut buf);
        // key 4, type string
        VarUInt32(4).proto_encode(&mut buf);
        VarUInt32(4).proto_encode(&mut buf);
        "name".proto_encode(&mut buf);

        let mut slice = buf.freeze();
        let metadata = EntityMetadata::proto_decode(&mut slice).unwrap();
        assert_eq!(metadata.entries.get(&0), Some(&MetadataValue::Float(1.5)));
        assert_eq!(
            metadata.entries.get(&4),
            Some(&MetadataValue::String("name".to_string()))
        );
        assert!(metadata.raw_tail.is_empty());

        // An NBT-typed entry stops the parse but keeps what was decoded.
        let mut buf = BytesMut::new();
        VarUInt32(2).proto_encode(&mut buf);
        VarUInt32(0).proto_encode(&mut buf);
        VarUInt32(0).proto_encode(&mut buf);
        5u8.proto_encode(&mut buf);
        VarUInt32(1).proto_encode(&mut buf);
        VarUInt32(5).proto_encode(&mut buf); // NBT type
        buf.extend_from_slice(b"\x0a\x00rest");
        let mut slice = buf.freeze();
        let metadata = EntityMetadata::proto_decode(&mut slice).unwrap();
        assert_eq!(metadata.entries.get(&0), Some(&MetadataValue::Byte(5)));
        assert_eq!(&metadata.raw_tail[..], b"\x0a\x00rest");
    }
}
