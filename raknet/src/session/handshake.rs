//! Online handshake and connected control packet handling.
//!
//! The offline stage (OpenConnectionRequest1/2) runs on the bare socket in
//! the transport; once frames flow, the session drives the remaining two
//! exchanges and answers keep-alive pings.

use bytes::{Bytes, BytesMut};

use crate::protocol::packet::{
    ConnectedPong, ConnectionRequest, DisconnectionNotification, NewIncomingConnection,
    RaknetPacket,
};
use crate::protocol::reliability::Reliability;
use crate::protocol::types::{MtuPadding, RaknetTime, SystemAddresses};

use super::{Priority, Session};

/// Outcome of feeding one clean payload through the session.
#[derive(Debug)]
pub enum SessionSignal {
    /// Nothing for the caller; the session handled it internally.
    None,
    /// The four-message handshake just completed.
    Established,
    /// The peer closed the connection.
    Disconnected,
    /// A game payload (leading `0xFE`) for the layer above.
    Game(Bytes),
}

impl Session {
    /// Queue the `ConnectionRequest` that opens the online handshake.
    pub fn begin_connection(&mut self) {
        let request = ConnectionRequest {
            client_guid: self.guid,
            timestamp: RaknetTime::now(),
            secure: false,
        };
        self.enqueue_packet(request.into(), Reliability::ReliableOrdered, Priority::Immediate);
    }

    /// Queue a graceful disconnection notification.
    pub fn send_disconnect(&mut self) {
        let notice = DisconnectionNotification {
            trailer: MtuPadding(0),
        };
        self.enqueue_packet(notice.into(), Reliability::ReliableOrdered, Priority::Immediate);
    }

    /// Route one clean (deduplicated, reassembled, ordered) payload: game
    /// payloads go up, control packets are answered here.
    pub fn handle_payload(&mut self, payload: Bytes) -> SessionSignal {
        if payload.first() == Some(&0xFE) {
            return SessionSignal::Game(payload);
        }

        let mut cursor = payload.clone();
        let packet = match RaknetPacket::decode(&mut cursor) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::debug!(%error, "dropping malformed connected packet");
                return SessionSignal::None;
            }
        };

        match packet {
            RaknetPacket::ConnectionRequestAccepted(accepted) => {
                let reply = NewIncomingConnection {
                    server_address: self.peer,
                    system_addresses: SystemAddresses::seeded(self.local),
                    request_timestamp: RaknetTime::now(),
                    accepted_timestamp: accepted.request_timestamp,
                };
                self.enqueue_packet(reply.into(), Reliability::ReliableOrdered, Priority::Immediate);

                if self.established {
                    SessionSignal::None
                } else {
                    self.established = true;
                    tracing::debug!(peer = %self.peer, "raknet session established");
                    SessionSignal::Established
                }
            }
            RaknetPacket::ConnectedPing(ping) => {
                let pong = ConnectedPong {
                    ping_time: ping.ping_time,
                    pong_time: RaknetTime::now(),
                };
                self.enqueue_packet(pong.into(), Reliability::Unreliable, Priority::Immediate);
                SessionSignal::None
            }
            RaknetPacket::DisconnectionNotification(_) => {
                tracing::debug!(peer = %self.peer, "peer sent disconnection notification");
                SessionSignal::Disconnected
            }
            other => {
                tracing::trace!(id = other.id(), "ignoring connected packet");
                SessionSignal::None
            }
        }
    }

    fn enqueue_packet(&mut self, packet: RaknetPacket, reliability: Reliability, priority: Priority) {
        let mut buf = BytesMut::new();
        if let Err(error) = packet.encode(&mut buf) {
            tracing::warn!(%error, id = packet.id(), "failed to encode control packet");
            return;
        }
        self.enqueue(buf.freeze(), reliability, 0, priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::Datagram;
    use crate::protocol::packet::{ConnectedPing, ConnectionRequestAccepted, Packet};

    fn session() -> Session {
        Session::new(
            "127.0.0.1:19132".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
            0xABCD,
        )
    }

    fn first_packet(s: &mut Session) -> RaknetPacket {
        let datagrams = s.take_datagrams();
        for datagram in datagrams {
            if let Datagram::Frames(set) = datagram {
                let mut payload = set.frames[0].payload.clone();
                return RaknetPacket::decode(&mut payload).unwrap();
            }
        }
        panic!("no frame set queued");
    }

    fn encode(packet: &RaknetPacket) -> Bytes {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        buf.freeze()
    }

    #[test]
    fn begin_connection_queues_connection_request() {
        let mut s = session();
        s.begin_connection();
        match first_packet(&mut s) {
            RaknetPacket::ConnectionRequest(req) => {
                assert_eq!(req.client_guid, 0xABCD);
                assert!(!req.secure);
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn accepted_triggers_new_incoming_connection_and_established() {
        let mut s = session();
        let accepted: RaknetPacket = ConnectionRequestAccepted {
            client_address: "127.0.0.1:50000".parse().unwrap(),
            system_index: 0,
            system_addresses: SystemAddresses::seeded("127.0.0.1:19132".parse().unwrap()),
            request_timestamp: RaknetTime(77),
            accepted_timestamp: RaknetTime(78),
        }
        .into();

        let signal = s.handle_payload(encode(&accepted));
        assert!(matches!(signal, SessionSignal::Established));
        assert!(s.is_established());

        match first_packet(&mut s) {
            RaknetPacket::NewIncomingConnection(nic) => {
                assert_eq!(nic.server_address, s.peer());
                assert_eq!(nic.accepted_timestamp, RaknetTime(77));
            }
            other => panic!("unexpected packet {other:?}"),
        }

        // A duplicate acceptance does not re-signal.
        let signal = s.handle_payload(encode(&accepted));
        assert!(matches!(signal, SessionSignal::None));
    }

    #[test]
    fn ping_is_answered_with_unreliable_pong() {
        let mut s = session();
        let ping: RaknetPacket = ConnectedPing {
            ping_time: RaknetTime(123),
        }
        .into();
        assert!(matches!(s.handle_payload(encode(&ping)), SessionSignal::None));

        let datagrams = s.take_datagrams();
        let Datagram::Frames(set) = &datagrams[0] else {
            panic!("expected frame set");
        };
        assert_eq!(set.frames[0].reliability, Reliability::Unreliable);
        let mut payload = set.frames[0].payload.clone();
        match RaknetPacket::decode(&mut payload).unwrap() {
            RaknetPacket::ConnectedPong(pong) => assert_eq!(pong.ping_time, RaknetTime(123)),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn game_payload_is_passed_up_untouched() {
        let mut s = session();
        let payload = Bytes::from_static(&[0xFE, 0xFF, 0x01, 0x02]);
        match s.handle_payload(payload.clone()) {
            SessionSignal::Game(game) => assert_eq!(game, payload),
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn disconnect_notification_signals_teardown() {
        let mut s = session();
        let payload = Bytes::from_static(&[DisconnectionNotification::ID]);
        assert!(matches!(
            s.handle_payload(payload),
            SessionSignal::Disconnected
        ));
    }
}
