//! The single-task session driver: all packet ingress, state transitions,
//! timer ticks and user commands are serialized here.

use std::net::SocketAddr;

use bytes::Bytes;
use raknet::{Message, Priority, RaknetClient, Reliability};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::identity::IdentityArtifact;
use crate::protocol::batch::{self, BatchConfig};
use crate::protocol::packets::{PlayerAuthInput, RequestNetworkSettings};
use crate::protocol::{id, ProtoEncode};
use crate::world::{EntityTracker, PlayerState};

use super::events::{Event, Subscriptions};
use super::{ClientConfig, Command, Phase};

const GAME_TICK: Duration = Duration::from_millis(50);

/// Why a session run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The server closed the connection (kick, RakNet disconnect, socket
    /// failure or a fatal login status).
    ServerClosed,
    /// The local API asked for the teardown.
    LocalDisconnect,
    /// The client handle was dropped.
    HandleDropped,
}

pub(crate) struct SessionState {
    pub phase: Phase,
    pub batch: BatchConfig,
    pub tick_count: u64,
    pub awaiting_dimension_ack: bool,
    pub player: PlayerState,
    pub entities: EntityTracker,
    pub subscriptions: Subscriptions,
    pub spawn_waiters: Vec<oneshot::Sender<()>>,
    /// Set by a handler to end the session after the current packet.
    pub shutdown: Option<SessionEnd>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            batch: BatchConfig::default(),
            tick_count: 0,
            awaiting_dimension_ack: false,
            player: PlayerState::default(),
            entities: EntityTracker::default(),
            subscriptions: Subscriptions::default(),
            spawn_waiters: Vec::new(),
            shutdown: None,
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.subscriptions.emit(&event);
    }
}

pub(crate) struct Driver {
    pub transport: RaknetClient,
    pub config: ClientConfig,
    pub identity: IdentityArtifact,
    pub peer: SocketAddr,
    pub state: SessionState,
}

impl Driver {
    pub fn new(
        transport: RaknetClient,
        config: ClientConfig,
        identity: IdentityArtifact,
        peer: SocketAddr,
    ) -> Self {
        Self {
            transport,
            config,
            identity,
            peer,
            state: SessionState::new(),
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut attempt = 0u32;
        loop {
            let end = self.run_session(&mut commands).await;
            let reached_spawned = self.state.phase == Phase::Spawned;

            self.state.phase = Phase::Disconnected;
            self.state.subscriptions.fail_waiters();
            self.state.spawn_waiters.clear();

            let retry = self.config.auto_reconnect
                && reached_spawned
                && end == SessionEnd::ServerClosed
                && attempt < self.config.max_reconnect_attempts;
            if !retry {
                break;
            }

            attempt += 1;
            let delay = self.config.reconnect_delay * attempt;
            tracing::info!(attempt, ?delay, "reconnecting after disconnect");
            time::sleep(delay).await;
            self.state.emit(Event::Reconnect { attempt });

            match RaknetClient::connect(self.peer).await {
                Ok(transport) => {
                    self.transport = transport;
                    let subscriptions = std::mem::take(&mut self.state.subscriptions);
                    self.state = SessionState::new();
                    self.state.subscriptions = subscriptions;
                }
                Err(error) => {
                    tracing::warn!(%error, attempt, "reconnect failed");
                    self.state.emit(Event::Error {
                        message: format!("reconnect failed: {error}"),
                    });
                    break;
                }
            }
        }
        tracing::debug!("session driver terminated");
    }

    async fn run_session(&mut self, commands: &mut mpsc::Receiver<Command>) -> SessionEnd {
        let mut tick = time::interval(GAME_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.state.phase = Phase::RaknetEstablished;
        self.state.emit(Event::RaknetConnect);
        self.send_packet(
            id::REQUEST_NETWORK_SETTINGS,
            &RequestNetworkSettings {
                client_protocol: self.config.protocol_version,
            },
            Priority::Immediate,
        )
        .await;

        loop {
            tokio::select! {
                payload = self.transport.recv() => {
                    match payload {
                        Some(Ok(bytes)) => {
                            self.handle_game_payload(bytes).await;
                            if let Some(end) = self.state.shutdown.take() {
                                self.finish(end, "connection closed by server").await;
                                return end;
                            }
                        }
                        Some(Err(error)) => {
                            tracing::debug!(%error, "transport error");
                            self.finish(SessionEnd::ServerClosed, &error.to_string()).await;
                            return SessionEnd::ServerClosed;
                        }
                        None => {
                            self.finish(SessionEnd::ServerClosed, "transport closed").await;
                            return SessionEnd::ServerClosed;
                        }
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Disconnect { notify_server }) => {
                            if notify_server {
                                let _ = self.transport.disconnect().await;
                            } else {
                                let _ = self.transport.abort().await;
                            }
                            self.finish(SessionEnd::LocalDisconnect, "disconnect requested").await;
                            return SessionEnd::LocalDisconnect;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => {
                            let _ = self.transport.disconnect().await;
                            self.finish(SessionEnd::HandleDropped, "client handle dropped").await;
                            return SessionEnd::HandleDropped;
                        }
                    }
                }

                _ = tick.tick() => self.on_tick().await,
            }
        }
    }

    /// One game tick: count, publish, and keep the server fed with input.
    async fn on_tick(&mut self) {
        self.state.tick_count += 1;
        let tick_count = self.state.tick_count;
        self.state.emit(Event::Tick(tick_count));

        if self.state.phase == Phase::Spawned && !self.state.awaiting_dimension_ack {
            let player = &self.state.player;
            let input = PlayerAuthInput::idle(
                player.position,
                player.pitch,
                player.yaw,
                player.head_yaw,
                tick_count,
            );
            self.send_packet(id::PLAYER_AUTH_INPUT, &input, Priority::Normal)
                .await;
        }
    }

    async fn handle_game_payload(&mut self, payload: Bytes) {
        let packets = match batch::decode_batch(payload, &self.state.batch) {
            Ok(packets) => packets,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed game batch");
                return;
            }
        };

        for sub_packet in packets {
            let (packet_id, body) = match batch::split_packet_header(sub_packet) {
                Ok(split) => split,
                Err(error) => {
                    tracing::warn!(%error, "dropping sub-packet with bad id header");
                    continue;
                }
            };
            let name = id::name(packet_id);

            self.state
                .subscriptions
                .offer_to_waiters(packet_id, name, &body);
            self.state.emit(Event::Packet {
                id: packet_id,
                name,
                payload: body.clone(),
            });

            self.handle_packet(packet_id, body).await;
            if self.state.shutdown.is_some() {
                return;
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Chat(message) => self.user_chat(message).await,
            Command::SendCommand(command) => self.user_command(command).await,
            Command::FormResponse { form_id, data } => self.user_form_response(form_id, data).await,
            Command::SetInitialized => self.user_set_initialized().await,
            Command::SubscribeEvents { id, callback } => {
                self.state.subscriptions.subscribe_events(id, callback);
            }
            Command::SubscribePackets { id, selector, callback } => {
                self.state
                    .subscriptions
                    .subscribe_packets(id, selector, callback);
            }
            Command::Unsubscribe(id) => self.state.subscriptions.unsubscribe(id),
            Command::WaitForPacket { selector, tx } => {
                self.state.subscriptions.add_waiter(selector, tx);
            }
            Command::WaitForSpawn { tx } => {
                if self.state.phase == Phase::Spawned {
                    let _ = tx.send(());
                } else {
                    self.state.spawn_waiters.push(tx);
                }
            }
            // Disconnect is handled directly in the select loop.
            Command::Disconnect { .. } => unreachable!("handled by run_session"),
        }
    }

    /// Common teardown path: publish the disconnect and fail any waits.
    async fn finish(&mut self, end: SessionEnd, reason: &str) {
        if end == SessionEnd::ServerClosed {
            tracing::info!(reason, "session closed");
        }
        self.state.emit(Event::Disconnect {
            reason: reason.to_string(),
        });
        self.state.subscriptions.fail_waiters();
        self.state.spawn_waiters.clear();
    }

    /// Serialize and ship one game packet through the batch codec.
    pub(crate) async fn send_packet(
        &mut self,
        packet_id: u32,
        packet: &impl ProtoEncode,
        priority: Priority,
    ) {
        let sub_packet = batch::encode_sub_packet(packet_id, packet);
        let payload = match batch::encode_single(sub_packet, &self.state.batch) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, packet_id, "failed to encode outgoing batch");
                return;
            }
        };
        let message = Message::new(payload)
            .reliability(Reliability::ReliableOrdered)
            .priority(priority);
        if let Err(error) = self.transport.send(message).await {
            tracing::warn!(%error, packet_id, "failed to queue outgoing packet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::compression::CompressionAlgorithm;
    use crate::protocol::packets::{
        ChunkRadiusUpdated, Login, NetworkSettings, PlayStatus, PlayStatusType,
        ResourcePackClientResponse, ResourcePackResponseStatus, ResourcePackStack,
        ResourcePacksInfo, StartGame, Text,
    };
    use crate::protocol::types::{BlockPos, Remainder, Vec2, Vec3};
    use crate::session::{Client, ClientConfig};
    use bytes::BytesMut;
    use raknet::protocol::constants::MTU;
    use raknet::protocol::frame::Datagram;
    use raknet::protocol::packet::{
        ConnectionRequestAccepted, CookieFlag, OpenConnectionReply1, OpenConnectionReply2,
        RaknetPacket,
    };
    use raknet::protocol::types::{RaknetTime, SystemAddresses, UnconnectedMagic};
    use raknet::session::Session;
    use tokio::net::UdpSocket;
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct ServerReport {
        /// Notable inbound packets, in arrival order.
        sequence: Vec<&'static str>,
        pack_statuses: Vec<ResourcePackResponseStatus>,
        auth_input_count: usize,
        chat: Option<String>,
        login_chain: Option<String>,
    }

    struct ScriptedServer {
        socket: UdpSocket,
        client: std::net::SocketAddr,
        session: Session,
        batch: BatchConfig,
        report: ServerReport,
    }

    impl ScriptedServer {
        async fn flush(&mut self) {
            for datagram in self.session.take_datagrams() {
                let mut out = BytesMut::new();
                datagram.encode(&mut out).unwrap();
                self.socket.send_to(&out, self.client).await.unwrap();
            }
        }

        async fn send_control(&mut self, packet: RaknetPacket) {
            let mut buf = BytesMut::new();
            packet.encode(&mut buf).unwrap();
            self.session.enqueue(
                buf.freeze(),
                Reliability::ReliableOrdered,
                0,
                Priority::Immediate,
            );
            self.flush().await;
        }

        async fn send_game(&mut self, packet_id: u32, packet: &impl ProtoEncode) {
            let sub = batch::encode_sub_packet(packet_id, packet);
            let payload = batch::encode_single(sub, &self.batch).unwrap();
            self.session.enqueue(
                payload,
                Reliability::ReliableOrdered,
                0,
                Priority::Immediate,
            );
            self.flush().await;
        }

        async fn handle_game(&mut self, packet_id: u32, body: Bytes) {
            match packet_id {
                id::REQUEST_NETWORK_SETTINGS => {
                    self.report.sequence.push("request_network_settings");
                    self.send_game(id::NETWORK_SETTINGS, &NetworkSettings::default())
                        .await;
                    self.batch.enable(CompressionAlgorithm::Zlib, 256);
                }
                id::LOGIN => {
                    self.report.sequence.push("login");
                    let login: Login = batch::decode_body(&body).unwrap();
                    self.report.login_chain = Some(login.identity_chain);
                    self.send_game(
                        id::PLAY_STATUS,
                        &PlayStatus {
                            status: PlayStatusType::LoginSuccess,
                        },
                    )
                    .await;
                    self.send_game(
                        id::RESOURCE_PACKS_INFO,
                        &ResourcePacksInfo {
                            texture_pack_required: false,
                            listing: Remainder::default(),
                        },
                    )
                    .await;
                }
                id::RESOURCE_PACK_CLIENT_RESPONSE => {
                    self.report.sequence.push("resource_pack_client_response");
                    let response: ResourcePackClientResponse = batch::decode_body(&body).unwrap();
                    self.report.pack_statuses.push(response.status);
                    match response.status {
                        ResourcePackResponseStatus::HaveAllPacks => {
                            self.send_game(
                                id::RESOURCE_PACK_STACK,
                                &ResourcePackStack {
                                    must_accept: false,
                                    listing: Remainder::default(),
                                },
                            )
                            .await;
                        }
                        ResourcePackResponseStatus::Completed => {
                            let start = StartGame {
                                entity_unique_id: -99,
                                entity_runtime_id: 99,
                                player_gamemode: 0,
                                position: Vec3::new(0.5, 65.62, 0.5),
                                rotation: Vec2::ZERO,
                                seed: 42,
                                dimension: 0,
                                generator: 2,
                                world_gamemode: 0,
                                difficulty: 1,
                                spawn_position: BlockPos { x: 0, y: 65, z: 0 },
                                world_name: "scripted".to_string(),
                                settings: Remainder::default(),
                            };
                            self.send_game(id::START_GAME, &start).await;
                        }
                        other => panic!("unexpected pack response {other:?}"),
                    }
                }
                id::REQUEST_CHUNK_RADIUS => {
                    self.report.sequence.push("request_chunk_radius");
                    self.send_game(id::CHUNK_RADIUS_UPDATED, &ChunkRadiusUpdated { radius: 10 })
                        .await;
                    self.send_game(
                        id::PLAY_STATUS,
                        &PlayStatus {
                            status: PlayStatusType::PlayerSpawn,
                        },
                    )
                    .await;
                }
                id::PLAYER_AUTH_INPUT => {
                    self.report.auth_input_count += 1;
                }
                id::TEXT => {
                    let text: Text = batch::decode_body(&body).unwrap();
                    self.report.chat = Some(text.message);
                }
                _ => {}
            }
        }

        async fn run(mut self) -> ServerReport {
            let mut buf = vec![0u8; MTU + 64];
            loop {
                if self.report.chat.is_some() && self.report.auth_input_count >= 2 {
                    return self.report;
                }
                let (len, _) = self.socket.recv_from(&mut buf).await.unwrap();
                let mut slice = &buf[..len];
                let Ok(datagram) = Datagram::decode(&mut slice) else {
                    continue;
                };
                let payloads = self.session.handle_datagram(datagram);
                for payload in payloads {
                    if payload.first() == Some(&0xFE) {
                        let packets = batch::decode_batch(payload, &self.batch).unwrap();
                        for sub in packets {
                            let (packet_id, body) = batch::split_packet_header(sub).unwrap();
                            self.handle_game(packet_id, body).await;
                        }
                    } else {
                        let mut cursor = payload.clone();
                        match RaknetPacket::decode(&mut cursor) {
                            Ok(RaknetPacket::ConnectionRequest(request)) => {
                                self.report.sequence.push("connection_request");
                                let accepted: RaknetPacket = ConnectionRequestAccepted {
                                    client_address: self.client,
                                    system_index: 0,
                                    system_addresses: SystemAddresses::seeded(self.client),
                                    request_timestamp: request.timestamp,
                                    accepted_timestamp: RaknetTime(1),
                                }
                                .into();
                                self.send_control(accepted).await;
                            }
                            Ok(RaknetPacket::NewIncomingConnection(_)) => {
                                self.report.sequence.push("new_incoming_connection");
                            }
                            _ => {}
                        }
                    }
                }
                self.session.on_tick();
                self.flush().await;
            }
        }
    }

    /// Answer the offline handshake, then hand the socket to the frame-level
    /// script.
    async fn accept_offline_handshake(socket: UdpSocket) -> ScriptedServer {
        let local = socket.local_addr().unwrap();
        let mut buf = vec![0u8; MTU + 64];

        let (_, client) = socket.recv_from(&mut buf).await.unwrap();
        let reply1: RaknetPacket = OpenConnectionReply1 {
            magic: UnconnectedMagic,
            server_guid: 0x77,
            cookie: CookieFlag(None),
            mtu: MTU as u16,
        }
        .into();
        let mut out = BytesMut::new();
        reply1.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();

        let _ = socket.recv_from(&mut buf).await.unwrap();
        let reply2: RaknetPacket = OpenConnectionReply2 {
            magic: UnconnectedMagic,
            server_guid: 0x77,
            client_addr: client,
            mtu: MTU as u16,
            security: false,
        }
        .into();
        let mut out = BytesMut::new();
        reply2.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();

        ScriptedServer {
            socket,
            client,
            session: Session::new(client, local, 0x77),
            batch: BatchConfig::default(),
            report: ServerReport::default(),
        }
    }

    #[tokio::test]
    async fn offline_login_reaches_spawn_with_ordered_outbound_sequence() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let scripted = accept_offline_handshake(socket).await;
            scripted.run().await
        });

        let config = ClientConfig::new("127.0.0.1", server_addr.port(), "Bot").offline(true);
        let client = time::timeout(Duration::from_secs(10), Client::connect(config))
            .await
            .expect("connect should not hang")
            .expect("connect should succeed");

        // Offline profile: deterministic v3 UUID under the URL namespace.
        assert_eq!(
            client.profile().uuid,
            Uuid::new_v3(&Uuid::NAMESPACE_URL, b"Bot")
        );
        assert_eq!(client.profile().xuid, "0");

        time::timeout(Duration::from_secs(10), client.wait_for_spawn())
            .await
            .expect("spawn should not hang")
            .expect("spawn should be reached");

        client.chat("hello world").await.unwrap();

        let report = time::timeout(Duration::from_secs(10), server)
            .await
            .expect("server script should finish")
            .unwrap();

        // The outbound login sequence, in order.
        assert_eq!(
            report.sequence,
            vec![
                "connection_request",
                "new_incoming_connection",
                "request_network_settings",
                "login",
                "resource_pack_client_response",
                "resource_pack_client_response",
                "request_chunk_radius",
            ]
        );
        assert_eq!(
            report.pack_statuses,
            vec![
                ResourcePackResponseStatus::HaveAllPacks,
                ResourcePackResponseStatus::Completed,
            ]
        );

        // The login chain is the single self-signed token.
        let chain: serde_json::Value =
            serde_json::from_str(report.login_chain.as_deref().unwrap()).unwrap();
        assert_eq!(chain["chain"].as_array().unwrap().len(), 1);

        // Keep-alive: PlayerAuthInput flows once spawned.
        assert!(report.auth_input_count >= 2);
        assert_eq!(report.chat.as_deref(), Some("hello world"));

        client.disconnect(true).await.unwrap();
    }
}
