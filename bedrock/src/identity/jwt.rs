//! Minimal ES384 compact JWT signing and inspection.
//!
//! The login chain only ever needs two operations: signing our own tokens
//! with the ephemeral key, and peeking into externally-issued tokens to pull
//! out the profile and the signing key URL. Verification of the external
//! chain is the server's job, not ours.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p384::ecdsa::signature::Signer;
use p384::ecdsa::{Signature, SigningKey};
use serde_json::Value;

use super::IdentityError;

/// Sign `header`/`claims` as a compact ES384 JWT. The signature is the raw
/// 96-byte `r || s` form, base64url encoded.
pub fn sign_es384(
    header: &Value,
    claims: &Value,
    key: &SigningKey,
) -> Result<String, IdentityError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature: Signature = key.sign(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Decode the header (segment 0) of a compact JWT without verifying it.
pub fn decode_header(token: &str) -> Result<Value, IdentityError> {
    decode_segment(token, 0)
}

/// Decode the claim set (segment 1) of a compact JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<Value, IdentityError> {
    decode_segment(token, 1)
}

fn decode_segment(token: &str, index: usize) -> Result<Value, IdentityError> {
    let segment = token
        .split('.')
        .nth(index)
        .ok_or(IdentityError::MalformedToken)?;
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| IdentityError::MalformedToken)?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keys::EphemeralKeyPair;
    use p384::ecdsa::signature::Verifier;
    use serde_json::json;

    #[test]
    fn token_has_three_segments_and_roundtrips() {
        let pair = EphemeralKeyPair::generate().unwrap();
        let header = json!({"alg": "ES384", "x5u": pair.x5u()});
        let claims = json!({"issuer": "self", "notBefore": 0});
        let token = sign_es384(&header, &claims, pair.signing_key()).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(decode_header(&token).unwrap()["alg"], "ES384");
        assert_eq!(decode_claims(&token).unwrap()["issuer"], "self");
    }

    #[test]
    fn signature_verifies_under_the_ephemeral_key() {
        let pair = EphemeralKeyPair::generate().unwrap();
        let token = sign_es384(
            &json!({"alg": "ES384"}),
            &json!({"k": 1}),
            pair.signing_key(),
        )
        .unwrap();

        let (signing_input, signature_b64) = token.rsplit_once('.').unwrap();
        let raw = URL_SAFE_NO_PAD.decode(signature_b64).unwrap();
        let signature = Signature::from_slice(&raw).unwrap();
        pair.signing_key()
            .verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(matches!(
            decode_claims("onlyonesegment"),
            Err(IdentityError::MalformedToken)
        ));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(IdentityError::MalformedToken)
        ));
    }
}
