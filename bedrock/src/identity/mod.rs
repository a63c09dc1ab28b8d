//! Identity assembly: the ephemeral key pair and the two signed tokens
//! presented in the Login packet.

pub mod jwt;
pub mod keys;
pub mod provider;
pub mod skin;

use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use keys::EphemeralKeyPair;
use provider::IdentityProvider;
use skin::UserClaimsParams;

/// Mojang's root signing key, used as the `identityPublicKey` claim when the
/// external chain's first token does not name one.
const MOJANG_PUBLIC_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

/// Deterministic namespace for offline-mode profile UUIDs.
const OFFLINE_UUID_NAMESPACE: Uuid = Uuid::NAMESPACE_URL;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key error: {0}")]
    Key(String),
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("identity provider returned an empty token chain")]
    EmptyChain,
    #[error("malformed token in chain")]
    MalformedToken,
}

/// The authenticated (or self-signed) player profile.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub uuid: Uuid,
    pub xuid: String,
}

/// Inputs to identity assembly, taken from the session configuration.
pub struct IdentityParams<'a> {
    pub username: &'a str,
    pub offline: bool,
    pub provider: Option<&'a dyn IdentityProvider>,
    pub server_address: String,
    pub game_version: &'a str,
    pub device_os: i64,
    pub skin_overrides: Option<&'a Map<String, Value>>,
}

/// Everything `connect` needs from the identity step. Built once per
/// session; immutable thereafter.
pub struct IdentityArtifact {
    pub profile: Profile,
    pub identity_token: String,
    pub user_token: String,
    pub external_chain: Vec<String>,
    key: EphemeralKeyPair,
}

impl IdentityArtifact {
    pub async fn assemble(params: IdentityParams<'_>) -> Result<Self, IdentityError> {
        let key = EphemeralKeyPair::generate()?;

        let (profile, identity_token, external_chain) = if params.offline {
            let (profile, token) = self_signed_identity(params.username, &key)?;
            (profile, token, Vec::new())
        } else {
            let provider = params
                .provider
                .ok_or_else(|| IdentityError::Provider("no identity provider configured".into()))?;
            let chain = provider
                .get_bedrock_token(key.x5u(), params.username)
                .await?;
            online_identity(chain, &key)?
        };

        let user_token = user_chain_token(
            &key,
            &UserClaimsParams {
                display_name: &profile.name,
                server_address: &params.server_address,
                game_version: params.game_version,
                device_os: params.device_os,
            },
            params.skin_overrides,
        )?;

        Ok(Self {
            profile,
            identity_token,
            user_token,
            external_chain,
            key,
        })
    }

    pub fn x5u(&self) -> &str {
        self.key.x5u()
    }

    /// The `{"chain":[...]}` document of the Login packet: our self-signed
    /// link first, then the external chain (empty when offline).
    pub fn login_chain_json(&self) -> String {
        let mut chain = Vec::with_capacity(1 + self.external_chain.len());
        chain.push(self.identity_token.clone());
        chain.extend(self.external_chain.iter().cloned());
        json!({ "chain": chain }).to_string()
    }
}

/// Offline mode: derive the profile from the username and sign an identity
/// token that vouches for itself.
fn self_signed_identity(
    username: &str,
    key: &EphemeralKeyPair,
) -> Result<(Profile, String), IdentityError> {
    let uuid = Uuid::new_v3(&OFFLINE_UUID_NAMESPACE, username.as_bytes());
    let profile = Profile {
        name: username.to_string(),
        uuid,
        xuid: "0".to_string(),
    };

    let header = json!({"alg": "ES384", "x5u": key.x5u()});
    let claims = json!({
        "certificateAuthority": true,
        "expiresIn": 3600,
        "extraData": {
            "displayName": profile.name,
            "identity": profile.uuid.to_string(),
            "titleId": "89692877",
            "XUID": profile.xuid,
        },
        "identityPublicKey": key.x5u(),
        "issuer": "self",
        "notBefore": 0,
    });
    let token = jwt::sign_es384(&header, &claims, key.signing_key())?;
    Ok((profile, token))
}

/// Online mode: pull the profile out of the external chain and sign a link
/// that delegates to the Mojang key the chain starts from.
fn online_identity(
    chain: Vec<String>,
    key: &EphemeralKeyPair,
) -> Result<(Profile, String, Vec<String>), IdentityError> {
    let first = chain.first().ok_or(IdentityError::EmptyChain)?;
    let last = chain.last().ok_or(IdentityError::EmptyChain)?;

    let extra_data = jwt::decode_claims(last)?;
    let extra = &extra_data["extraData"];
    let profile = Profile {
        name: extra["displayName"].as_str().unwrap_or_default().to_string(),
        uuid: extra["identity"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::nil),
        xuid: extra["XUID"].as_str().unwrap_or("0").to_string(),
    };

    let mojang_key = jwt::decode_header(first)?["x5u"]
        .as_str()
        .unwrap_or(MOJANG_PUBLIC_KEY)
        .to_string();

    let header = json!({"alg": "ES384", "x5u": key.x5u()});
    let claims = json!({
        "certificateAuthority": true,
        "identityPublicKey": mojang_key,
    });
    let token = jwt::sign_es384(&header, &claims, key.signing_key())?;
    Ok((profile, token, chain))
}

fn user_chain_token(
    key: &EphemeralKeyPair,
    params: &UserClaimsParams<'_>,
    overrides: Option<&Map<String, Value>>,
) -> Result<String, IdentityError> {
    let header = json!({"alg": "ES384", "typ": "JWT", "x5u": key.x5u()});
    let mut claims = skin::build_user_claims(params);
    if let Some(overrides) = overrides {
        skin::merge_overrides(&mut claims, overrides);
    }
    jwt::sign_es384(&header, &Value::Object(claims), key.signing_key())
}
