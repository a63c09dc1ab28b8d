use thiserror::Error;

/// Top-level error type of the client session.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Raknet(#[from] raknet::RaknetError),
    #[error(transparent)]
    Identity(#[from] crate::identity::IdentityError),
    #[error("could not resolve server address {0}")]
    Resolve(String),
    #[error("session is not connected")]
    NotConnected,
    #[error("timed out waiting for packet")]
    WaitTimeout,
}
