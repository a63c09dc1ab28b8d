//! Re-exports the [`raknet`] and [`bedrock`] libraries for convenient access
//! to the client networking stack.
#[cfg(feature = "bedrock")]
pub use bedrock;
#[cfg(feature = "raknet")]
pub use raknet;
