pub mod offline;
pub mod online;

pub use offline::*;
pub use online::*;

use bytes::{Buf, BufMut, Bytes};

use crate::protocol::{DecodeError, EncodeError, RaknetEncodable};

/// Trait implemented by concrete control packet bodies.
///
/// Only the body is covered here; the leading ID byte belongs to
/// [`RaknetPacket`], which owns dispatch.
pub trait Packet: Sized {
    /// The fixed ID byte used to identify this packet on the wire.
    const ID: u8;

    /// Encode the body of this packet into the destination buffer.
    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError>;

    /// Decode the body of this packet from the source buffer.
    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

/// Declares a control packet as an ordered list of wire fields.
///
/// Every field type carries its own codec through [`RaknetEncodable`], so
/// the body encode/decode fall straight out of the declaration order —
/// including validation, which lives in field types such as
/// [`UnconnectedMagic`](crate::protocol::types::UnconnectedMagic).
macro_rules! raknet_packet {
    (
        $(#[$doc:meta])*
        $id:literal => $name:ident {
            $( $(#[$field_doc:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            $( $(#[$field_doc])* pub $field: $ty, )*
        }

        impl $crate::protocol::packet::Packet for $name {
            const ID: u8 = $id;

            fn encode_body(
                &self,
                dst: &mut impl ::bytes::BufMut,
            ) -> Result<(), $crate::protocol::EncodeError> {
                $( $crate::protocol::RaknetEncodable::encode_raknet(&self.$field, dst)?; )*
                Ok(())
            }

            fn decode_body(
                src: &mut impl ::bytes::Buf,
            ) -> Result<Self, $crate::protocol::DecodeError> {
                $( let $field = <$ty as $crate::protocol::RaknetEncodable>::decode_raknet(src)?; )*
                Ok(Self { $( $field, )* })
            }
        }
    };
}
pub(crate) use raknet_packet;

/// Builds [`RaknetPacket`] over the registered packet types, along with
/// `From` impls so call sites can hand a concrete body straight to the
/// session.
macro_rules! control_registry {
    ( $( $variant:ident ),+ $(,)? ) => {
        /// Union of the control packets a client session can see or send.
        ///
        /// IDs with no registered body decode to [`RaknetPacket::Unknown`]
        /// with the payload preserved verbatim, so unexpected traffic can be
        /// logged or ignored without data loss.
        #[derive(Debug, Clone)]
        pub enum RaknetPacket {
            $( $variant($variant), )+
            Unknown { id: u8, payload: Bytes },
        }

        $(
            impl From<$variant> for RaknetPacket {
                fn from(body: $variant) -> Self {
                    RaknetPacket::$variant(body)
                }
            }
        )+

        impl RaknetPacket {
            /// Body decode for a known ID; `None` when the ID is not
            /// registered.
            fn decode_registered(
                id: u8,
                src: &mut impl Buf,
            ) -> Option<Result<Self, DecodeError>> {
                $(
                    if id == $variant::ID {
                        return Some($variant::decode_body(src).map(RaknetPacket::$variant));
                    }
                )+
                None
            }

            /// Return the wire ID associated with this packet.
            pub fn id(&self) -> u8 {
                match self {
                    $( RaknetPacket::$variant(_) => $variant::ID, )+
                    RaknetPacket::Unknown { id, .. } => *id,
                }
            }

            /// Decode a full packet (ID byte + body) from the buffer.
            pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
                let id = u8::decode_raknet(src)?;
                match Self::decode_registered(id, src) {
                    Some(result) => result,
                    None => {
                        let payload = src.copy_to_bytes(src.remaining());
                        Ok(RaknetPacket::Unknown { id, payload })
                    }
                }
            }

            /// Encode a full packet (ID byte + body) into the buffer.
            pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
                self.id().encode_raknet(dst)?;
                match self {
                    $( RaknetPacket::$variant(body) => body.encode_body(dst), )+
                    RaknetPacket::Unknown { payload, .. } => {
                        dst.put_slice(payload);
                        Ok(())
                    }
                }
            }
        }
    };
}

control_registry! {
    ConnectedPing,
    ConnectedPong,
    OpenConnectionRequest1,
    OpenConnectionReply1,
    OpenConnectionRequest2,
    OpenConnectionReply2,
    ConnectionRequest,
    ConnectionRequestAccepted,
    NewIncomingConnection,
    DisconnectionNotification,
    IncompatibleProtocolVersion,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::RaknetTime;
    use bytes::BytesMut;

    #[test]
    fn registered_packet_dispatches_by_id() {
        let packet: RaknetPacket = ConnectionRequest {
            client_guid: 0x1122_3344_5566_7788,
            timestamp: RaknetTime(9000),
            secure: false,
        }
        .into();
        assert_eq!(packet.id(), 0x09);

        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(buf[0], 0x09);

        let mut slice = buf.freeze();
        match RaknetPacket::decode(&mut slice).unwrap() {
            RaknetPacket::ConnectionRequest(request) => {
                assert_eq!(request.client_guid, 0x1122_3344_5566_7788);
                assert_eq!(request.timestamp, RaknetTime(9000));
                assert!(!request.secure);
            }
            other => panic!("wrong variant: {other:?}"),
        }
        assert!(!slice.has_remaining());
    }

    #[test]
    fn unknown_id_preserves_payload() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFE);
        buf.put_slice(b"batch");
        let mut slice = buf.freeze();
        match RaknetPacket::decode(&mut slice).unwrap() {
            RaknetPacket::Unknown { id, payload } => {
                assert_eq!(id, 0xFE);
                assert_eq!(&payload[..], b"batch");
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn unknown_packet_reencodes_verbatim() {
        let packet = RaknetPacket::Unknown {
            id: 0x42,
            payload: Bytes::from_static(b"\x01\x02"),
        };
        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x42, 0x01, 0x02]);
    }

    #[test]
    fn empty_buffer_is_an_eof() {
        let mut slice = Bytes::new();
        assert!(matches!(
            RaknetPacket::decode(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
