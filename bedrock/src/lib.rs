//! Minecraft Bedrock Edition client session core.
//!
//! Builds on the [`raknet`] reliability layer and adds the game-side stack:
//! the `0xFE` batch codec with negotiated compression, the typed packet
//! codec, ES384 identity assembly, the login state machine and the world
//! mirror.
//!
//! ```rust,no_run
//! use bedrock::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 19132, "Bot").offline(true);
//!     let client = Client::connect(config).await?;
//!     client.wait_for_spawn().await?;
//!     client.chat("hello world").await?;
//!     Ok(())
//! }
//! ```
pub mod error;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod world;

pub use error::ClientError;
pub use session::events::Event;
pub use session::{Client, ClientConfig, Phase};
