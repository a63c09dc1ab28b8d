//! Connected control packets, travelling inside frame sets once a session
//! is established. Declared as wire field lists; see the offline module for
//! the same pattern on the handshake side.

use std::net::SocketAddr;

use crate::protocol::packet::raknet_packet;
use crate::protocol::types::{MtuPadding, RaknetTime, SystemAddresses};

raknet_packet! {
    /// Keep-alive probe; must be answered promptly or the peer assumes the
    /// connection is dead.
    0x00 => ConnectedPing {
        ping_time: RaknetTime,
    }
}

raknet_packet! {
    /// Answer to [`ConnectedPing`], echoing its timestamp next to our own.
    0x03 => ConnectedPong {
        ping_time: RaknetTime,
        pong_time: RaknetTime,
    }
}

raknet_packet! {
    /// First reliable message of the online handshake.
    0x09 => ConnectionRequest {
        client_guid: u64,
        timestamp: RaknetTime,
        secure: bool,
    }
}

raknet_packet! {
    /// The server's acceptance; its `request_timestamp` is echoed back in
    /// [`NewIncomingConnection`].
    0x10 => ConnectionRequestAccepted {
        client_address: SocketAddr,
        system_index: u16,
        system_addresses: SystemAddresses,
        request_timestamp: RaknetTime,
        accepted_timestamp: RaknetTime,
    }
}

raknet_packet! {
    /// Final client message of the handshake; the connection is live after
    /// this goes out.
    0x13 => NewIncomingConnection {
        server_address: SocketAddr,
        system_addresses: SystemAddresses,
        request_timestamp: RaknetTime,
        accepted_timestamp: RaknetTime,
    }
}

raknet_packet! {
    /// Graceful close. Empty on the wire; some implementations append a
    /// reason byte, which the trailer absorbs.
    0x15 => DisconnectionNotification {
        trailer: MtuPadding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::Packet;
    use bytes::BytesMut;

    #[test]
    fn connection_request_golden_bytes() {
        let request = ConnectionRequest {
            client_guid: 0x0102_0304_0506_0708,
            timestamp: RaknetTime(256),
            secure: false,
        };
        let mut buf = BytesMut::new();
        request.encode_body(&mut buf).unwrap();

        let expected: &[u8] = &[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // guid
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, // timestamp
            0x00, // secure
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn pong_echoes_the_ping_timestamp() {
        let pong = ConnectedPong {
            ping_time: RaknetTime(77),
            pong_time: RaknetTime(78),
        };
        let mut buf = BytesMut::new();
        pong.encode_body(&mut buf).unwrap();
        let mut slice = buf.freeze();
        let decoded = ConnectedPong::decode_body(&mut slice).unwrap();
        assert_eq!(decoded.ping_time, RaknetTime(77));
        assert_eq!(decoded.pong_time, RaknetTime(78));
    }

    #[test]
    fn handshake_packets_roundtrip_their_address_lists() {
        let peer: SocketAddr = "198.51.100.20:19132".parse().unwrap();
        let packet = NewIncomingConnection {
            server_address: peer,
            system_addresses: SystemAddresses::seeded(peer),
            request_timestamp: RaknetTime(5),
            accepted_timestamp: RaknetTime(6),
        };
        let mut buf = BytesMut::new();
        packet.encode_body(&mut buf).unwrap();
        let mut slice = buf.freeze();
        let decoded = NewIncomingConnection::decode_body(&mut slice).unwrap();
        assert_eq!(decoded.server_address, peer);
        assert_eq!(decoded.system_addresses.0[0], peer);
        assert_eq!(decoded.accepted_timestamp, RaknetTime(6));

        let accepted = ConnectionRequestAccepted {
            client_address: peer,
            system_index: 0,
            system_addresses: SystemAddresses::seeded(peer),
            request_timestamp: RaknetTime(1),
            accepted_timestamp: RaknetTime(2),
        };
        let mut buf = BytesMut::new();
        accepted.encode_body(&mut buf).unwrap();
        let mut slice = buf.freeze();
        let decoded = ConnectionRequestAccepted::decode_body(&mut slice).unwrap();
        assert_eq!(decoded.client_address, peer);
        assert_eq!(decoded.request_timestamp, RaknetTime(1));
    }

    #[test]
    fn disconnect_encodes_empty_and_absorbs_trailers() {
        let notice = DisconnectionNotification {
            trailer: MtuPadding(0),
        };
        let mut buf = BytesMut::new();
        notice.encode_body(&mut buf).unwrap();
        assert!(buf.is_empty());

        let mut slice = bytes::Bytes::from_static(&[0x00]);
        DisconnectionNotification::decode_body(&mut slice).unwrap();
        assert!(slice.is_empty());
    }
}
