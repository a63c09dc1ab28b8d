//! UDP transport: owns the socket, performs the offline handshake and runs
//! the per-connection muxer task that drives the [`Session`].

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, timeout, MissedTickBehavior};

use crate::error::RaknetError;
use crate::protocol::constants::{
    ACK_FLUSH_INTERVAL, HANDSHAKE_TIMEOUT, MTU, RAKNET_PROTOCOL_VERSION,
};
use crate::protocol::frame::Datagram;
use crate::protocol::packet::{
    CookieEcho, OpenConnectionRequest1, OpenConnectionRequest2, RaknetPacket,
};
use crate::protocol::reliability::Reliability;
use crate::protocol::types::{MtuPadding, UnconnectedMagic};
use crate::session::{Priority, Session, SessionSignal};

/// Per-datagram overhead of the IPv4 + UDP headers plus the packet ID,
/// magic and protocol byte of OpenConnectionRequest1. The padding of that
/// packet fills the rest of the advertised MTU.
const REQUEST1_OVERHEAD: usize = 20 + 8 + 1 + 16 + 1;

/// Configuration for a [`RaknetClient`].
#[derive(Debug, Clone)]
pub struct RaknetClientConfig {
    /// Timeout applied to each stage of the offline handshake.
    pub handshake_timeout: Duration,
    /// Capacity of the inbound payload channel.
    pub incoming_capacity: usize,
}

impl Default for RaknetClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            incoming_capacity: 128,
        }
    }
}

/// An outbound payload with its delivery annotations.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Bytes,
    pub reliability: Reliability,
    pub channel: u8,
    pub priority: Priority,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            reliability: Reliability::ReliableOrdered,
            channel: 0,
            priority: Priority::Normal,
        }
    }

    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

enum Command {
    Send(Message),
    Disconnect,
    /// Tear down without sending anything further (used after the peer
    /// already closed the connection at a higher layer).
    Abort,
}

/// A connected RakNet client stream.
///
/// All session state lives in a spawned muxer task; this handle talks to it
/// over channels. Dropping the handle tears the connection down after a
/// best-effort disconnection notification.
pub struct RaknetClient {
    local: SocketAddr,
    peer: SocketAddr,
    incoming: mpsc::Receiver<Result<Bytes, RaknetError>>,
    commands: mpsc::Sender<Command>,
}

impl RaknetClient {
    /// Connect to a RakNet server using the default configuration.
    pub async fn connect(server: SocketAddr) -> Result<Self, RaknetError> {
        Self::connect_with_config(server, RaknetClientConfig::default()).await
    }

    /// Connect to a RakNet server, driving the full four-message handshake.
    pub async fn connect_with_config(
        server: SocketAddr,
        config: RaknetClientConfig,
    ) -> Result<Self, RaknetError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let local = socket.local_addr()?;
        let client_guid: u64 = rand::random();

        perform_offline_handshake(&socket, server, client_guid, config.handshake_timeout).await?;

        let mut session = Session::new(server, local, client_guid);
        session.begin_connection();

        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (to_app_tx, to_app_rx) = mpsc::channel(config.incoming_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(run_muxer(socket, session, commands_rx, to_app_tx, ready_tx));

        match timeout(config.handshake_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(Self {
                local,
                peer: server,
                incoming: to_app_rx,
                commands: commands_tx,
            }),
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) => Err(RaknetError::ConnectionAborted),
            Err(_) => Err(RaknetError::HandshakeTimeout("ConnectionRequestAccepted")),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Receive the next clean game payload. Returns `None` once the
    /// connection is gone.
    pub async fn recv(&mut self) -> Option<Result<Bytes, RaknetError>> {
        self.incoming.recv().await
    }

    /// Queue a payload for delivery to the server.
    pub async fn send(&self, message: Message) -> Result<(), RaknetError> {
        self.commands
            .send(Command::Send(message))
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }

    /// Notify the server and tear the connection down.
    pub async fn disconnect(&self) -> Result<(), RaknetError> {
        self.commands
            .send(Command::Disconnect)
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }

    /// Tear the connection down without notifying the server.
    pub async fn abort(&self) -> Result<(), RaknetError> {
        self.commands
            .send(Command::Abort)
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }
}

/// The offline stage: OpenConnectionRequest1 → Reply1 → Request2 → Reply2,
/// at the fixed MTU. No retries; a failure here is terminal.
async fn perform_offline_handshake(
    socket: &UdpSocket,
    server: SocketAddr,
    client_guid: u64,
    stage_timeout: Duration,
) -> Result<(), RaknetError> {
    let request1: RaknetPacket = OpenConnectionRequest1 {
        magic: UnconnectedMagic,
        protocol_version: RAKNET_PROTOCOL_VERSION,
        padding: MtuPadding(MTU - REQUEST1_OVERHEAD),
    }
    .into();
    send_offline_packet(socket, server, &request1).await?;

    let reply1 = await_offline_reply(socket, server, stage_timeout, "OpenConnectionReply1", |pkt| {
        match pkt {
            RaknetPacket::OpenConnectionReply1(reply) => Some(Ok(reply)),
            RaknetPacket::IncompatibleProtocolVersion(incompatible) => {
                Some(Err(RaknetError::IncompatibleProtocolVersion {
                    server: incompatible.protocol,
                }))
            }
            _ => None,
        }
    })
    .await??;

    tracing::debug!(server_guid = reply1.server_guid, "received OpenConnectionReply1");

    let request2: RaknetPacket = OpenConnectionRequest2 {
        magic: UnconnectedMagic,
        cookie: CookieEcho(reply1.cookie.0),
        server_addr: server,
        mtu: MTU as u16,
        client_guid,
    }
    .into();
    send_offline_packet(socket, server, &request2).await?;

    let reply2 = await_offline_reply(socket, server, stage_timeout, "OpenConnectionReply2", |pkt| {
        match pkt {
            RaknetPacket::OpenConnectionReply2(reply) => Some(Ok(reply)),
            _ => None,
        }
    })
    .await??;

    tracing::debug!(
        server_guid = reply2.server_guid,
        mtu = reply2.mtu,
        "offline handshake complete"
    );
    Ok(())
}

async fn send_offline_packet(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &RaknetPacket,
) -> Result<(), RaknetError> {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf)?;
    socket.send_to(&buf, server).await?;
    Ok(())
}

async fn await_offline_reply<T>(
    socket: &UdpSocket,
    server: SocketAddr,
    stage_timeout: Duration,
    stage: &'static str,
    mut select: impl FnMut(RaknetPacket) -> Option<Result<T, RaknetError>>,
) -> Result<Result<T, RaknetError>, RaknetError> {
    let mut buf = [0u8; 2048];
    let deadline = time::Instant::now() + stage_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let (len, from) = match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Err(RaknetError::HandshakeTimeout(stage)),
        };
        if from != server {
            tracing::debug!(%from, "ignoring packet from unknown peer during handshake");
            continue;
        }
        let mut slice = &buf[..len];
        match RaknetPacket::decode(&mut slice) {
            Ok(packet) => {
                if let Some(outcome) = select(packet) {
                    return Ok(outcome);
                }
                tracing::debug!(stage, "ignoring unexpected packet during handshake");
            }
            Err(error) => {
                tracing::debug!(%error, stage, "ignoring malformed packet during handshake");
            }
        }
    }
}

#[tracing::instrument(skip_all, fields(peer = %session.peer()), level = "debug")]
async fn run_muxer(
    socket: UdpSocket,
    mut session: Session,
    mut commands: mpsc::Receiver<Command>,
    to_app: mpsc::Sender<Result<Bytes, RaknetError>>,
    ready: oneshot::Sender<Result<(), RaknetError>>,
) {
    let peer = session.peer();
    let mut ready = Some(ready);
    let mut buf = vec![0u8; MTU + 64];
    let mut tick = time::interval(ACK_FLUSH_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    flush_outgoing(&mut session, &socket, peer).await;

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, from) = match result {
                    Ok(value) => value,
                    Err(error) => {
                        tracing::error!(%error, "udp socket recv error");
                        let _ = to_app.send(Err(RaknetError::Io(error))).await;
                        break;
                    }
                };
                if from != peer || len == 0 {
                    continue;
                }

                let mut slice = &buf[..len];
                let datagram = match Datagram::decode(&mut slice) {
                    Ok(datagram) => datagram,
                    Err(error) => {
                        tracing::debug!(%error, "dropping malformed datagram");
                        continue;
                    }
                };

                let mut disconnected = false;
                for payload in session.handle_datagram(datagram) {
                    match session.handle_payload(payload) {
                        SessionSignal::Game(game) => {
                            if to_app.send(Ok(game)).await.is_err() {
                                tracing::debug!("app channel closed");
                                return;
                            }
                        }
                        SessionSignal::Established => {
                            if let Some(tx) = ready.take() {
                                let _ = tx.send(Ok(()));
                            }
                        }
                        SessionSignal::Disconnected => {
                            disconnected = true;
                        }
                        SessionSignal::None => {}
                    }
                }
                flush_outgoing(&mut session, &socket, peer).await;

                if disconnected {
                    // Clean server-side close; nothing further is sent.
                    let _ = to_app.send(Err(RaknetError::Disconnected)).await;
                    break;
                }
            }

            command = commands.recv() => {
                match command {
                    Some(Command::Send(message)) => {
                        session.enqueue(
                            message.payload,
                            message.reliability,
                            message.channel,
                            message.priority,
                        );
                        flush_outgoing(&mut session, &socket, peer).await;
                    }
                    Some(Command::Disconnect) | None => {
                        tracing::debug!("closing connection");
                        session.send_disconnect();
                        flush_outgoing(&mut session, &socket, peer).await;
                        break;
                    }
                    Some(Command::Abort) => {
                        tracing::debug!("aborting connection");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                session.on_tick();
                flush_outgoing(&mut session, &socket, peer).await;
            }
        }
    }

    tracing::debug!("muxer terminated");
}

/// Ship every staged datagram. Send errors are logged and do not terminate
/// the session; frame-level NACKs recover any loss.
async fn flush_outgoing(session: &mut Session, socket: &UdpSocket, peer: SocketAddr) {
    for datagram in session.take_datagrams() {
        let mut out = BytesMut::new();
        if let Err(error) = datagram.encode(&mut out) {
            tracing::warn!(%error, "failed to encode outgoing datagram");
            continue;
        }
        if let Err(error) = socket.send_to(&out, peer).await {
            tracing::warn!(%error, "udp send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{Frame, FrameSet};
    use crate::protocol::packet::{
        ConnectionRequestAccepted, CookieFlag, OpenConnectionReply1, OpenConnectionReply2,
    };
    use crate::protocol::types::{RaknetTime, Sequence24, SystemAddresses};

    /// Minimal scripted server: answers the offline handshake, accepts the
    /// connection request and then forwards one game payload.
    async fn run_scripted_server(socket: UdpSocket) {
        let mut buf = vec![0u8; 2048];

        // OpenConnectionRequest1 -> Reply1
        let (_, client) = socket.recv_from(&mut buf).await.unwrap();
        let reply1: RaknetPacket = OpenConnectionReply1 {
            magic: UnconnectedMagic,
            server_guid: 0x55,
            cookie: CookieFlag(None),
            mtu: MTU as u16,
        }
        .into();
        let mut out = BytesMut::new();
        reply1.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();

        // OpenConnectionRequest2 -> Reply2
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        let mut slice = &buf[..len];
        match RaknetPacket::decode(&mut slice).unwrap() {
            RaknetPacket::OpenConnectionRequest2(req) => assert_eq!(req.mtu, MTU as u16),
            other => panic!("expected request2, got {other:?}"),
        }
        let reply2: RaknetPacket = OpenConnectionReply2 {
            magic: UnconnectedMagic,
            server_guid: 0x55,
            client_addr: client,
            mtu: MTU as u16,
            security: false,
        }
        .into();
        let mut out = BytesMut::new();
        reply2.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();

        // Frame set with ConnectionRequest -> ConnectionRequestAccepted
        let request_timestamp = loop {
            let (len, _) = socket.recv_from(&mut buf).await.unwrap();
            let mut slice = &buf[..len];
            let Ok(Datagram::Frames(set)) = Datagram::decode(&mut slice) else {
                continue;
            };
            let mut payload = set.frames[0].payload.clone();
            if let Ok(RaknetPacket::ConnectionRequest(req)) = RaknetPacket::decode(&mut payload) {
                break req.timestamp;
            }
        };
        let accepted: RaknetPacket = ConnectionRequestAccepted {
            client_address: client,
            system_index: 0,
            system_addresses: SystemAddresses::seeded(client),
            request_timestamp,
            accepted_timestamp: RaknetTime(1),
        }
        .into();
        let mut body = BytesMut::new();
        accepted.encode(&mut body).unwrap();
        let mut frame = Frame::new(Reliability::ReliableOrdered, body.freeze());
        frame.reliable_index = Some(Sequence24::ZERO);
        frame.order_index = Some(Sequence24::ZERO);
        frame.order_channel = Some(0);
        let datagram = Datagram::Frames(FrameSet {
            sequence: Sequence24::ZERO,
            frames: vec![frame],
        });
        let mut out = BytesMut::new();
        datagram.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();

        // NewIncomingConnection arrives, then push one game payload down.
        loop {
            let (len, _) = socket.recv_from(&mut buf).await.unwrap();
            let mut slice = &buf[..len];
            let Ok(Datagram::Frames(set)) = Datagram::decode(&mut slice) else {
                continue;
            };
            let mut payload = set.frames[0].payload.clone();
            if let Ok(RaknetPacket::NewIncomingConnection(_)) = RaknetPacket::decode(&mut payload) {
                break;
            }
        }

        let mut frame = Frame::new(
            Reliability::ReliableOrdered,
            Bytes::from_static(&[0xFE, 0x01, 0x02]),
        );
        frame.reliable_index = Some(Sequence24::new(1));
        frame.order_index = Some(Sequence24::new(1));
        frame.order_channel = Some(0);
        let datagram = Datagram::Frames(FrameSet {
            sequence: Sequence24::new(1),
            frames: vec![frame],
        });
        let mut out = BytesMut::new();
        datagram.encode(&mut out).unwrap();
        socket.send_to(&out, client).await.unwrap();
    }

    #[tokio::test]
    async fn full_handshake_and_first_payload() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_socket.local_addr().unwrap();
        let server = tokio::spawn(run_scripted_server(server_socket));

        let mut client = RaknetClient::connect(server_addr).await.unwrap();
        assert_eq!(client.peer_addr(), server_addr);

        let payload = client.recv().await.unwrap().unwrap();
        assert_eq!(&payload[..], &[0xFE, 0x01, 0x02]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_times_out_without_server() {
        let config = RaknetClientConfig {
            handshake_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let unused: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let result = RaknetClient::connect_with_config(unused, config).await;
        assert!(matches!(result, Err(RaknetError::HandshakeTimeout(_))));
    }
}
