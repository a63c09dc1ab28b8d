//! External identity provider interface.
//!
//! The Xbox Live OAuth dance lives outside this crate. Whatever implements
//! this trait hands back the ordered list of signed tokens for a given
//! public key; the assembler prepends its own self-signed link at login.

use std::future::Future;
use std::pin::Pin;

use super::IdentityError;

pub type TokenChainFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, IdentityError>> + Send + 'a>>;

pub trait IdentityProvider: Send + Sync {
    /// Exchange the session's public key (`x5u`, base64 DER-SPKI) for the
    /// externally-signed token chain.
    fn get_bedrock_token<'a>(&'a self, x5u: &'a str, username: &'a str) -> TokenChainFuture<'a>;
}
