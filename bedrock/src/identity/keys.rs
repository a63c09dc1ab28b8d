use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p384::ecdsa::SigningKey;
use p384::pkcs8::EncodePublicKey;
use p384::PublicKey;
use rand::rngs::OsRng;

use super::IdentityError;

/// Ephemeral secp384r1 key pair bound to one session's identity tokens.
///
/// The public half is exported as DER-SPKI and base64 encoded; that string
/// (the `x5u`) names the key in every JWT header the client signs.
pub struct EphemeralKeyPair {
    signing_key: SigningKey,
    x5u: String,
}

impl EphemeralKeyPair {
    pub fn generate() -> Result<Self, IdentityError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let der = PublicKey::from(signing_key.verifying_key())
            .to_public_key_der()
            .map_err(|e| IdentityError::Key(e.to_string()))?;
        let x5u = STANDARD.encode(der.as_bytes());
        Ok(Self { signing_key, x5u })
    }

    pub fn x5u(&self) -> &str {
        &self.x5u
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}
