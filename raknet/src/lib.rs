//!
//!
//! ## Example: Client
//!
//! ```rust,no_run
//! use raknet::{RaknetClient, Message};
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addr: SocketAddr = "127.0.0.1:19132".parse()?;
//!     let mut client = RaknetClient::connect(addr).await?;
//!     client.send(Message::new(vec![0xFE, 0x01])).await?;
//!     while let Some(payload) = client.recv().await {
//!         // Handle a clean game payload
//!         let _ = payload?;
//!     }
//!     Ok(())
//! }
//! ```
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::RaknetError;
pub use protocol::reliability::Reliability;
pub use session::Priority;
pub use transport::{Message, RaknetClient, RaknetClientConfig};
