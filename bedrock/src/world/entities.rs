use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::packets::EntityMetadata;
use crate::protocol::types::Vec3;

/// A remote entity the server has put in view.
#[derive(Debug, Clone, Default)]
pub struct TrackedEntity {
    pub runtime_id: u64,
    pub unique_id: i64,
    pub entity_type: String,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub metadata: EntityMetadata,
    /// Present for player entities only.
    pub username: Option<String>,
    pub uuid: Option<Uuid>,
}

/// Entities keyed by runtime id; the unique id is a secondary key used only
/// by the remove packet.
#[derive(Debug, Default)]
pub struct EntityTracker {
    entities: HashMap<u64, TrackedEntity>,
}

impl EntityTracker {
    pub fn add(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.runtime_id, entity);
    }

    pub fn get(&self, runtime_id: u64) -> Option<&TrackedEntity> {
        self.entities.get(&runtime_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// Remove by the packet's unique id. A linear scan; view distances keep
    /// the table small.
    pub fn remove_by_unique_id(&mut self, unique_id: i64) -> Option<TrackedEntity> {
        let runtime_id = self
            .entities
            .values()
            .find(|entity| entity.unique_id == unique_id)
            .map(|entity| entity.runtime_id)?;
        self.entities.remove(&runtime_id)
    }

    pub fn update_position(
        &mut self,
        runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        head_yaw: f32,
    ) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.position = position;
            entity.pitch = pitch;
            entity.yaw = yaw;
            entity.head_yaw = head_yaw;
        }
    }

    pub fn update_motion(&mut self, runtime_id: u64, motion: Vec3) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.motion = motion;
        }
    }

    pub fn update_metadata(&mut self, runtime_id: u64, metadata: EntityMetadata) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.metadata = metadata;
        }
    }

    /// The entity closest to `position` by squared distance.
    pub fn nearest(&self, position: Vec3) -> Option<&TrackedEntity> {
        self.entities.values().min_by(|a, b| {
            a.position
                .distance_squared(&position)
                .total_cmp(&b.position.distance_squared(&position))
        })
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
