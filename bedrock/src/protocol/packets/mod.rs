//! Typed game packets consumed or produced by the session core.
//!
//! Server-bound packets the client never sends are decode-only; packets with
//! long tails the client does not act on capture the rest as a raw
//! [`Remainder`](crate::protocol::types::Remainder).

mod entity;
mod handshake;
mod interaction;
mod movement;
mod resource_packs;
mod world;

pub use entity::*;
pub use handshake::*;
pub use interaction::*;
pub use movement::*;
pub use resource_packs::*;
pub use world::*;
