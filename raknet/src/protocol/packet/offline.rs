//! Offline negotiation packets, exchanged on the bare socket before a
//! session exists.
//!
//! Each packet is declared as its wire field list; magic validation and the
//! cookie quirks live in dedicated field types rather than per-packet code.

use std::net::SocketAddr;

use bytes::{Buf, BufMut};

use crate::protocol::packet::raknet_packet;
use crate::protocol::types::{MtuPadding, UnconnectedMagic};
use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// The cookie slot of `OpenConnectionReply1`: a presence flag, then the
/// value when the server issued one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieFlag(pub Option<u32>);

impl RaknetEncodable for CookieFlag {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.0.is_some().encode_raknet(dst)?;
        if let Some(cookie) = self.0 {
            cookie.encode_raknet(dst)?;
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let cookie = if bool::decode_raknet(src)? {
            Some(u32::decode_raknet(src)?)
        } else {
            None
        };
        Ok(CookieFlag(cookie))
    }
}

/// The cookie echo of `OpenConnectionRequest2`: the value plus a
/// client-proof flag when a cookie was issued, nothing otherwise.
///
/// There is no presence flag on the wire, so a receiver cannot tell the two
/// layouts apart without heuristics; this client never decodes its own
/// request, and the proof scheme is unsupported, so decoding yields no
/// cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieEcho(pub Option<u32>);

impl RaknetEncodable for CookieEcho {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        if let Some(cookie) = self.0 {
            cookie.encode_raknet(dst)?;
            false.encode_raknet(dst)?;
        }
        Ok(())
    }

    fn decode_raknet(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(CookieEcho(None))
    }
}

raknet_packet! {
    /// Opens negotiation: the protocol probe, padded out to the advertised
    /// MTU so the path proves it can carry full-size datagrams.
    0x05 => OpenConnectionRequest1 {
        magic: UnconnectedMagic,
        protocol_version: u8,
        padding: MtuPadding,
    }
}

raknet_packet! {
    /// The server's first reply, naming its GUID, chosen MTU and an
    /// optional anti-spoof cookie.
    0x06 => OpenConnectionReply1 {
        magic: UnconnectedMagic,
        server_guid: u64,
        cookie: CookieFlag,
        mtu: u16,
    }
}

raknet_packet! {
    /// Second-stage request carrying the target address, the fixed MTU and
    /// the client GUID.
    0x07 => OpenConnectionRequest2 {
        magic: UnconnectedMagic,
        cookie: CookieEcho,
        server_addr: SocketAddr,
        mtu: u16,
        client_guid: u64,
    }
}

raknet_packet! {
    /// Final offline reply; frames may flow once this arrives.
    0x08 => OpenConnectionReply2 {
        magic: UnconnectedMagic,
        server_guid: u64,
        client_addr: SocketAddr,
        mtu: u16,
        security: bool,
    }
}

raknet_packet! {
    /// Sent by a server that does not speak our protocol version.
    0x19 => IncompatibleProtocolVersion {
        protocol: u8,
        magic: UnconnectedMagic,
        server_guid: u64,
    }
}
