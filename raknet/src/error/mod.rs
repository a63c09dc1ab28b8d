use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaknetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet decode error: {0}")]
    Decode(#[from] crate::protocol::DecodeError),
    #[error("packet encode error: {0}")]
    Encode(#[from] crate::protocol::EncodeError),
    #[error("timed out waiting for {0} during the connection handshake")]
    HandshakeTimeout(&'static str),
    #[error("server requires RakNet protocol version {server}")]
    IncompatibleProtocolVersion { server: u8 },
    #[error("connection aborted")]
    ConnectionAborted,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("disconnected by remote peer")]
    Disconnected,
}
