//! The session controller: configuration, the public client handle and the
//! command protocol between the handle and the driver task.
//!
//! All mutable session state lives in one spawned driver task; the `Client`
//! handle talks to it over a command channel, mirroring the transport
//! architecture of the RakNet layer underneath.

pub mod driver;
pub mod events;
mod handlers;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::error::ClientError;
use crate::identity::provider::IdentityProvider;
use crate::identity::{IdentityArtifact, IdentityParams, Profile};
use events::{Event, EventCallback, PacketSelector};

/// Session lifecycle phases. Advances monotonically until `Disconnected`,
/// which may be re-entered from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    RaknetEstablished,
    LoggingIn,
    Spawning,
    Spawned,
}

/// Everything a session needs to connect and present an identity.
#[derive(Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Skip the external identity flow and self-sign the identity chain.
    pub offline: bool,
    /// Echoed in RequestNetworkSettings and Login.
    pub protocol_version: i32,
    /// Stamped into the user token.
    pub game_version: String,
    /// Requested chunk radius.
    pub view_distance: i32,
    /// Stamped into the user token.
    pub device_os: i64,
    /// Overrides merged into the user token's skin fields.
    pub skin_data: Option<Map<String, Value>>,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    /// Required unless `offline` is set.
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            offline: false,
            protocol_version: 685,
            game_version: "1.21.1.03".to_string(),
            view_distance: 10,
            device_os: 7,
            skin_data: None,
            auto_reconnect: false,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(3),
            identity_provider: None,
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn view_distance(mut self, view_distance: i32) -> Self {
        self.view_distance = view_distance;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    pub fn skin_data(mut self, overrides: Map<String, Value>) -> Self {
        self.skin_data = Some(overrides);
        self
    }

    fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub(crate) enum Command {
    Chat(String),
    SendCommand(String),
    FormResponse {
        form_id: u32,
        data: Option<String>,
    },
    SetInitialized,
    Disconnect {
        notify_server: bool,
    },
    SubscribeEvents {
        id: u64,
        callback: EventCallback,
    },
    SubscribePackets {
        id: u64,
        selector: PacketSelector,
        callback: EventCallback,
    },
    Unsubscribe(u64),
    WaitForPacket {
        selector: PacketSelector,
        tx: oneshot::Sender<(u32, Bytes)>,
    },
    WaitForSpawn {
        tx: oneshot::Sender<()>,
    },
}

/// Handle to a running client session.
pub struct Client {
    commands: mpsc::Sender<Command>,
    profile: Profile,
    peer: SocketAddr,
    next_subscription: AtomicU64,
}

/// Unregistration handle returned by the subscription methods.
pub struct Subscription {
    id: u64,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    /// Remove the callback. A no-op if the session is already gone.
    pub async fn unsubscribe(self) {
        let _ = self.commands.send(Command::Unsubscribe(self.id)).await;
    }
}

impl Client {
    /// Assemble an identity, run the RakNet handshake and start the session
    /// driver. Resolves once the reliability layer is established; login
    /// progress is reported through events.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let server_address = config.server_address();
        let identity = IdentityArtifact::assemble(IdentityParams {
            username: &config.username,
            offline: config.offline,
            provider: config.identity_provider.as_deref(),
            server_address: server_address.clone(),
            game_version: &config.game_version,
            device_os: config.device_os,
            skin_overrides: config.skin_data.as_ref(),
        })
        .await?;
        let profile = identity.profile.clone();

        let peer = tokio::net::lookup_host(&server_address)
            .await
            .map_err(raknet::RaknetError::Io)?
            .next()
            .ok_or_else(|| ClientError::Resolve(server_address.clone()))?;

        let transport = raknet::RaknetClient::connect(peer).await?;

        let (commands_tx, commands_rx) = mpsc::channel(64);
        let runner = driver::Driver::new(transport, config, identity, peer);
        tokio::spawn(runner.run(commands_rx));

        Ok(Self {
            commands: commands_tx,
            profile,
            peer,
            next_subscription: AtomicU64::new(1),
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send a chat message. Ignored (with a warning) outside `Spawned`.
    pub async fn chat(&self, message: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::Chat(message.into())).await
    }

    /// Issue a slash command; the leading `/` is added if missing.
    pub async fn send_command(&self, command: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::SendCommand(command.into())).await
    }

    /// Answer a server form. `None` means the form was cancelled.
    pub async fn respond_to_form(
        &self,
        form_id: u32,
        data: Option<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::FormResponse { form_id, data }).await
    }

    /// Announce the local player as initialized. Callable once StartGame has
    /// arrived.
    pub async fn set_initialized(&self) -> Result<(), ClientError> {
        self.send(Command::SetInitialized).await
    }

    /// Tear the session down, optionally notifying the server first.
    pub async fn disconnect(&self, notify_server: bool) -> Result<(), ClientError> {
        self.send(Command::Disconnect { notify_server }).await
    }

    /// Subscribe to every session event.
    pub async fn on_event(
        &self,
        callback: impl FnMut(&Event) + Send + 'static,
    ) -> Result<Subscription, ClientError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.send(Command::SubscribeEvents {
            id,
            callback: Box::new(callback),
        })
        .await?;
        Ok(Subscription {
            id,
            commands: self.commands.clone(),
        })
    }

    /// Subscribe to decoded packets matching an id or name.
    pub async fn on_packet(
        &self,
        selector: impl Into<PacketSelector>,
        callback: impl FnMut(&Event) + Send + 'static,
    ) -> Result<Subscription, ClientError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.send(Command::SubscribePackets {
            id,
            selector: selector.into(),
            callback: Box::new(callback),
        })
        .await?;
        Ok(Subscription {
            id,
            commands: self.commands.clone(),
        })
    }

    /// Resolve on the first packet matching the selector, or fail after the
    /// timeout. A disconnect fails the wait.
    pub async fn wait_for_packet(
        &self,
        selector: impl Into<PacketSelector>,
        timeout: Option<Duration>,
    ) -> Result<(u32, Bytes), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::WaitForPacket {
            selector: selector.into(),
            tx,
        })
        .await?;

        let wait = async { rx.await.map_err(|_| ClientError::NotConnected) };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ClientError::WaitTimeout)?,
            None => wait.await,
        }
    }

    /// Resolve once the session reaches `Spawned` (immediately if it already
    /// has).
    pub async fn wait_for_spawn(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::WaitForSpawn { tx }).await?;
        rx.await.map_err(|_| ClientError::NotConnected)
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::NotConnected)
    }
}
