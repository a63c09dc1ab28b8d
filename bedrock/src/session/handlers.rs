//! Inbound packet handlers and the user-facing actions, all running inside
//! the driver task.

use bytes::Bytes;
use raknet::Priority;
use uuid::Uuid;

use crate::protocol::batch;
use crate::protocol::compression::CompressionAlgorithm;
use crate::protocol::id;
use crate::protocol::packets::{
    command_origin, respawn_state, AddEntity, AddPlayer, ChangeDimension, ChunkRadiusUpdated,
    CommandOrigin, CommandRequest, Disconnect, Login, ModalFormRequest, ModalFormResponse,
    MovePlayer, NetworkSettings, NetworkStackLatency, PlayStatus, PlayStatusType, PlayerAction,
    RemoveEntity, RequestChunkRadius, ResourcePackClientResponse, Respawn, SetEntityData,
    SetEntityMotion, SetLocalPlayerAsInitialized, SetPlayerGameType, Text, UpdateAttributes,
};
use crate::protocol::packets::MoveEntity;
use crate::protocol::ProtoDecode;
use crate::world::TrackedEntity;

use super::driver::{Driver, SessionEnd};
use super::events::Event;
use super::Phase;

fn decode<T: ProtoDecode>(body: &Bytes, what: &'static str) -> Option<T> {
    match batch::decode_body(body) {
        Ok(packet) => Some(packet),
        Err(error) => {
            tracing::warn!(%error, what, "dropping undecodable packet");
            None
        }
    }
}

impl Driver {
    pub(crate) async fn handle_packet(&mut self, packet_id: u32, body: Bytes) {
        match packet_id {
            id::NETWORK_SETTINGS => self.on_network_settings(body).await,
            id::PLAY_STATUS => self.on_play_status(body).await,
            id::DISCONNECT => self.on_disconnect(body).await,
            id::RESOURCE_PACKS_INFO => self.on_resource_packs_info().await,
            id::RESOURCE_PACK_STACK => self.on_resource_pack_stack().await,
            id::START_GAME => self.on_start_game(body).await,
            id::CHUNK_RADIUS_UPDATED => self.on_chunk_radius_updated(body),
            id::TEXT => self.on_text(body),
            id::MOVE_PLAYER => self.on_move_player(body),
            id::CHANGE_DIMENSION => self.on_change_dimension(body).await,
            id::RESPAWN => self.on_respawn(body).await,
            id::SET_PLAYER_GAME_TYPE => self.on_set_player_game_type(body),
            id::NETWORK_STACK_LATENCY => self.on_network_stack_latency(body).await,
            id::ADD_PLAYER => self.on_add_player(body),
            id::ADD_ENTITY => self.on_add_entity(body),
            id::REMOVE_ENTITY => self.on_remove_entity(body),
            id::SET_ENTITY_MOTION => self.on_set_entity_motion(body),
            id::MOVE_ENTITY => self.on_move_entity(body),
            id::SET_ENTITY_DATA => self.on_set_entity_data(body),
            id::UPDATE_ATTRIBUTES => self.on_update_attributes(body),
            id::MODAL_FORM_REQUEST => self.on_modal_form_request(body),
            // Known to trip over edge cases; observed via the generic
            // packet event only.
            id::LEVEL_CHUNK | id::LEVEL_SOUND_EVENT => {}
            _ => {}
        }
    }

    // --- Login negotiation -------------------------------------------------

    async fn on_network_settings(&mut self, body: Bytes) {
        if self.state.batch.compression_enabled {
            tracing::debug!("ignoring duplicate NetworkSettings");
            return;
        }
        let Some(settings) = decode::<NetworkSettings>(&body, "network_settings") else {
            return;
        };

        let algorithm = CompressionAlgorithm::from_u16(settings.compression_algorithm)
            .unwrap_or(CompressionAlgorithm::Zlib);
        self.state
            .batch
            .enable(algorithm, settings.compression_threshold as usize);
        tracing::debug!(
            ?algorithm,
            threshold = settings.compression_threshold,
            "compression negotiated"
        );

        // The Login packet is sent exactly once, compressed under the
        // settings that just arrived.
        let login = Login {
            client_protocol: self.config.protocol_version,
            identity_chain: self.identity.login_chain_json(),
            user_chain: self.identity.user_token.clone(),
        };
        self.send_packet(id::LOGIN, &login, Priority::Immediate).await;
    }

    async fn on_play_status(&mut self, body: Bytes) {
        let Some(status) = decode::<PlayStatus>(&body, "play_status") else {
            return;
        };
        match status.status {
            PlayStatusType::LoginSuccess => {
                self.state.phase = Phase::LoggingIn;
                self.state.emit(Event::Login);
            }
            PlayStatusType::PlayerSpawn => {
                self.state.phase = Phase::Spawned;
                self.state.emit(Event::Spawn);
                for waiter in self.state.spawn_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
            status if status.is_failure() => {
                self.state.emit(Event::Error {
                    message: format!("login failed: {}", status.describe()),
                });
                let _ = self.transport.disconnect().await;
                self.state.shutdown = Some(SessionEnd::ServerClosed);
            }
            _ => {}
        }
    }

    async fn on_disconnect(&mut self, body: Bytes) {
        let message = decode::<Disconnect>(&body, "disconnect")
            .map(|packet| packet.message)
            .unwrap_or_default();
        self.state.emit(Event::Kick {
            message: message.clone(),
        });
        // Nothing further is sent after a server-side disconnect.
        let _ = self.transport.abort().await;
        self.state.shutdown = Some(SessionEnd::ServerClosed);
    }

    async fn on_resource_packs_info(&mut self) {
        self.send_packet(
            id::RESOURCE_PACK_CLIENT_RESPONSE,
            &ResourcePackClientResponse::have_all_packs(),
            Priority::Immediate,
        )
        .await;
    }

    async fn on_resource_pack_stack(&mut self) {
        self.send_packet(
            id::RESOURCE_PACK_CLIENT_RESPONSE,
            &ResourcePackClientResponse::completed(),
            Priority::Immediate,
        )
        .await;
    }

    async fn on_start_game(&mut self, body: Bytes) {
        let Some(start) = decode::<crate::protocol::packets::StartGame>(&body, "start_game") else {
            return;
        };

        let player = &mut self.state.player;
        player.entity_id = start.entity_unique_id;
        player.runtime_entity_id = start.entity_runtime_id;
        player.position = start.position;
        player.pitch = start.rotation.x;
        player.yaw = start.rotation.y;
        player.head_yaw = start.rotation.y;
        player.gamemode = start.player_gamemode;
        player.dimension = start.dimension;
        player.spawn_position = start.spawn_position;
        player.world_name = start.world_name.clone();
        player.seed = start.seed;
        player.difficulty = start.difficulty;
        player.world_gamemode = start.world_gamemode;

        self.state.phase = Phase::Spawning;
        self.state.emit(Event::StartGame {
            entity_id: start.entity_unique_id,
            runtime_entity_id: start.entity_runtime_id,
            world_name: start.world_name,
        });

        self.send_packet(
            id::REQUEST_CHUNK_RADIUS,
            &RequestChunkRadius {
                radius: self.config.view_distance,
                max_radius: 32,
            },
            Priority::Immediate,
        )
        .await;
    }

    fn on_chunk_radius_updated(&mut self, body: Bytes) {
        if let Some(update) = decode::<ChunkRadiusUpdated>(&body, "chunk_radius_updated") {
            self.state.emit(Event::ChunkRadiusUpdated(update.radius));
        }
    }

    // --- Steady state ------------------------------------------------------

    fn on_text(&mut self, body: Bytes) {
        if let Some(text) = decode::<Text>(&body, "text") {
            self.state.emit(Event::Text {
                source: text.source_name,
                message: text.message,
                xuid: text.xuid,
            });
        }
    }

    fn on_move_player(&mut self, body: Bytes) {
        let Some(movement) = decode::<MovePlayer>(&body, "move_player") else {
            return;
        };
        if movement.runtime_entity_id == self.state.player.runtime_entity_id {
            let player = &mut self.state.player;
            player.position = movement.position;
            player.pitch = movement.pitch;
            player.yaw = movement.yaw;
            player.head_yaw = movement.head_yaw;
        } else {
            self.state.entities.update_position(
                movement.runtime_entity_id,
                movement.position,
                movement.pitch,
                movement.yaw,
                movement.head_yaw,
            );
        }
    }

    async fn on_change_dimension(&mut self, body: Bytes) {
        let Some(change) = decode::<ChangeDimension>(&body, "change_dimension") else {
            return;
        };

        // Input cadence is suppressed until the acknowledgement is out.
        self.state.awaiting_dimension_ack = true;
        self.state.player.dimension = change.dimension;
        self.state.player.position = change.position;

        let runtime_entity_id = self.state.player.runtime_entity_id;
        self.send_packet(
            id::PLAYER_ACTION,
            &PlayerAction::dimension_change_ack(runtime_entity_id),
            Priority::Immediate,
        )
        .await;
        self.state.awaiting_dimension_ack = false;
    }

    async fn on_respawn(&mut self, body: Bytes) {
        let Some(respawn) = decode::<Respawn>(&body, "respawn") else {
            return;
        };
        if respawn.state != respawn_state::SERVER_READY_TO_SPAWN {
            return;
        }

        self.state.player.position = respawn.position;
        let reply = Respawn {
            position: respawn.position,
            state: respawn_state::CLIENT_READY_TO_SPAWN,
            runtime_entity_id: self.state.player.runtime_entity_id,
        };
        self.send_packet(id::RESPAWN, &reply, Priority::Immediate).await;
    }

    fn on_set_player_game_type(&mut self, body: Bytes) {
        if let Some(update) = decode::<SetPlayerGameType>(&body, "set_player_game_type") {
            self.state.player.gamemode = update.gamemode;
        }
    }

    async fn on_network_stack_latency(&mut self, body: Bytes) {
        let Some(probe) = decode::<NetworkStackLatency>(&body, "network_stack_latency") else {
            return;
        };
        if !probe.from_server {
            return;
        }
        let reply = NetworkStackLatency {
            timestamp: probe.timestamp,
            from_server: false,
        };
        self.send_packet(id::NETWORK_STACK_LATENCY, &reply, Priority::Immediate)
            .await;
    }

    // --- World mirror ------------------------------------------------------

    fn on_add_player(&mut self, body: Bytes) {
        let Some(added) = decode::<AddPlayer>(&body, "add_player") else {
            return;
        };
        let runtime_id = added.runtime_entity_id;
        self.state.entities.add(TrackedEntity {
            runtime_id,
            unique_id: runtime_id as i64,
            entity_type: "minecraft:player".to_string(),
            position: added.position,
            motion: added.motion,
            pitch: added.pitch,
            yaw: added.yaw,
            head_yaw: added.head_yaw,
            metadata: Default::default(),
            username: Some(added.username),
            uuid: Some(added.uuid),
        });
        self.state.emit(Event::EntityAdded { runtime_id });
    }

    fn on_add_entity(&mut self, body: Bytes) {
        let Some(added) = decode::<AddEntity>(&body, "add_entity") else {
            return;
        };
        let runtime_id = added.runtime_entity_id;
        self.state.entities.add(TrackedEntity {
            runtime_id,
            unique_id: added.entity_unique_id,
            entity_type: added.entity_type,
            position: added.position,
            motion: added.motion,
            pitch: added.pitch,
            yaw: added.yaw,
            head_yaw: added.head_yaw,
            metadata: Default::default(),
            username: None,
            uuid: None,
        });
        self.state.emit(Event::EntityAdded { runtime_id });
    }

    fn on_remove_entity(&mut self, body: Bytes) {
        let Some(removal) = decode::<RemoveEntity>(&body, "remove_entity") else {
            return;
        };
        if self
            .state
            .entities
            .remove_by_unique_id(removal.entity_unique_id)
            .is_some()
        {
            self.state.emit(Event::EntityRemoved {
                unique_id: removal.entity_unique_id,
            });
        }
    }

    fn on_set_entity_motion(&mut self, body: Bytes) {
        if let Some(update) = decode::<SetEntityMotion>(&body, "set_entity_motion") {
            self.state
                .entities
                .update_motion(update.runtime_entity_id, update.motion);
        }
    }

    fn on_move_entity(&mut self, body: Bytes) {
        if let Some(movement) = decode::<MoveEntity>(&body, "move_entity") {
            self.state.entities.update_position(
                movement.runtime_entity_id,
                movement.position,
                MoveEntity::angle(movement.pitch),
                MoveEntity::angle(movement.yaw),
                MoveEntity::angle(movement.head_yaw),
            );
        }
    }

    fn on_set_entity_data(&mut self, body: Bytes) {
        let Some(update) = decode::<SetEntityData>(&body, "set_entity_data") else {
            return;
        };
        if update.runtime_entity_id != self.state.player.runtime_entity_id {
            self.state
                .entities
                .update_metadata(update.runtime_entity_id, update.metadata);
        }
    }

    fn on_update_attributes(&mut self, body: Bytes) {
        let Some(update) = decode::<UpdateAttributes>(&body, "update_attributes") else {
            return;
        };
        // Only local-player attributes are mirrored.
        if update.runtime_entity_id == self.state.player.runtime_entity_id {
            self.state.player.update_attributes(update.attributes);
        }
    }

    fn on_modal_form_request(&mut self, body: Bytes) {
        if let Some(form) = decode::<ModalFormRequest>(&body, "modal_form_request") {
            self.state.emit(Event::FormRequest {
                form_id: form.form_id,
                form_data: form.form_data,
            });
        }
    }

    // --- User actions ------------------------------------------------------

    fn require_spawned(&self, what: &'static str) -> bool {
        if self.state.phase == Phase::Spawned {
            true
        } else {
            tracing::warn!(what, phase = ?self.state.phase, "ignoring action before spawn");
            false
        }
    }

    pub(crate) async fn user_chat(&mut self, message: String) {
        if !self.require_spawned("chat") {
            return;
        }
        let text = Text::chat(
            self.identity.profile.name.clone(),
            message,
            self.identity.profile.xuid.clone(),
        );
        self.send_packet(id::TEXT, &text, Priority::Immediate).await;
    }

    pub(crate) async fn user_command(&mut self, command: String) {
        if !self.require_spawned("send_command") {
            return;
        }
        let command = if command.starts_with('/') {
            command
        } else {
            format!("/{command}")
        };
        let request = CommandRequest {
            command,
            origin: CommandOrigin {
                origin_type: command_origin::PLAYER,
                uuid: self.identity.profile.uuid,
                request_id: Uuid::new_v4().to_string(),
                player_unique_id: self.state.player.entity_id,
            },
            internal: false,
            version: 52,
        };
        self.send_packet(id::COMMAND_REQUEST, &request, Priority::Immediate)
            .await;
    }

    pub(crate) async fn user_form_response(&mut self, form_id: u32, data: Option<String>) {
        if !self.require_spawned("respond_to_form") {
            return;
        }
        let response = match data {
            Some(data) => ModalFormResponse::answered(form_id, data),
            None => ModalFormResponse::cancelled(form_id),
        };
        self.send_packet(id::MODAL_FORM_RESPONSE, &response, Priority::Immediate)
            .await;
    }

    pub(crate) async fn user_set_initialized(&mut self) {
        if !matches!(self.state.phase, Phase::Spawning | Phase::Spawned) {
            tracing::warn!(phase = ?self.state.phase, "set_initialized before StartGame");
            return;
        }
        let packet = SetLocalPlayerAsInitialized {
            runtime_entity_id: self.state.player.runtime_entity_id,
        };
        self.send_packet(id::SET_LOCAL_PLAYER_AS_INITIALIZED, &packet, Priority::Immediate)
            .await;
    }
}
