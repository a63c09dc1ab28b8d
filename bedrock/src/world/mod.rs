//! Local world mirror: the player's own state and the tracked entities
//! around it, fed by inbound packet handlers.

pub mod entities;

use std::collections::HashMap;

use crate::protocol::packets::Attribute;
use crate::protocol::types::{BlockPos, Vec3};

pub use entities::{EntityTracker, TrackedEntity};

/// The local player as the server last described it. Populated by
/// `StartGame`, then mutated only by the movement/dimension/respawn
/// handlers.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    pub entity_id: i64,
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub gamemode: i32,
    pub dimension: i32,
    pub spawn_position: BlockPos,
    pub world_name: String,
    pub seed: u64,
    pub difficulty: i32,
    pub world_gamemode: i32,
    attributes: HashMap<String, Attribute>,
}

impl PlayerState {
    /// Replace every attribute whose name appears in the update; others are
    /// untouched.
    pub fn update_attributes(&mut self, updates: Vec<Attribute>) {
        for attribute in updates {
            self.attributes.insert(attribute.name.clone(), attribute);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Current health, or the vanilla default of 20 before any update.
    pub fn health(&self) -> f32 {
        self.attributes
            .get("minecraft:health")
            .map(|a| a.current)
            .unwrap_or(20.0)
    }

    /// Current movement speed, or the vanilla default of 0.1.
    pub fn movement_speed(&self) -> f32 {
        self.attributes
            .get("minecraft:movement")
            .map(|a| a.current)
            .unwrap_or(0.1)
    }
}
