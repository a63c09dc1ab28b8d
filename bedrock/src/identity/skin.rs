//! Default skin and device claims for the user chain token.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Resource patch pointing the skin at the standard humanoid geometry.
const SKIN_RESOURCE_PATCH: &str = r#"{"geometry":{"default":"geometry.humanoid.custom"}}"#;

/// Minimal valid geometry document.
const SKIN_GEOMETRY: &str = r#"{"format_version":"1.12.0","minecraft:geometry":[]}"#;

const SKIN_WIDTH: usize = 64;
const SKIN_HEIGHT: usize = 64;

/// A 64x64 RGBA image filled with a single opaque colour.
fn solid_skin_image() -> Vec<u8> {
    const PIXEL: [u8; 4] = [0x7F, 0x7F, 0x7F, 0xFF];
    PIXEL.repeat(SKIN_WIDTH * SKIN_HEIGHT)
}

/// Inputs stamped into the default user claims.
pub struct UserClaimsParams<'a> {
    pub display_name: &'a str,
    pub server_address: &'a str,
    pub game_version: &'a str,
    pub device_os: i64,
}

/// Build the default user-chain claim set. Caller-supplied overrides are
/// merged on top by [`merge_overrides`].
pub fn build_user_claims(params: &UserClaimsParams<'_>) -> Map<String, Value> {
    let device_id = Uuid::new_v4();
    let self_signed_id = Uuid::new_v4();
    let play_fab_id = Uuid::new_v4().simple().to_string()[..16].to_string();

    let claims = json!({
        "AnimatedImageData": [],
        "ArmSize": "wide",
        "CapeData": "",
        "CapeId": "",
        "CapeImageHeight": 0,
        "CapeImageWidth": 0,
        "CapeOnClassicSkin": false,
        "ClientRandomId": rand::random::<u32>() as i64,
        "CompatibleWithClientSideChunkGen": false,
        "CurrentInputMode": 1,
        "DefaultInputMode": 1,
        "DeviceId": device_id.to_string(),
        "DeviceModel": "PC",
        "DeviceOS": params.device_os,
        "GameVersion": params.game_version,
        "GuiScale": 0,
        "IsEditorMode": false,
        "LanguageCode": "en_US",
        "OverrideSkin": false,
        "PersonaPieces": [],
        "PersonaSkin": false,
        "PieceTintColors": [],
        "PlatformOfflineId": "",
        "PlatformOnlineId": "",
        "PlayFabId": play_fab_id,
        "PremiumSkin": false,
        "SelfSignedId": self_signed_id.to_string(),
        "ServerAddress": params.server_address,
        "SkinAnimationData": "",
        "SkinColor": "#0",
        "SkinData": STANDARD.encode(solid_skin_image()),
        "SkinGeometryData": STANDARD.encode(SKIN_GEOMETRY),
        "SkinGeometryDataEngineVersion": STANDARD.encode("0.0.0"),
        "SkinId": format!("{}.Custom", Uuid::new_v4()),
        "SkinImageHeight": SKIN_HEIGHT,
        "SkinImageWidth": SKIN_WIDTH,
        "SkinResourcePatch": STANDARD.encode(SKIN_RESOURCE_PATCH),
        "ThirdPartyName": params.display_name,
        "ThirdPartyNameOnly": false,
        "TrustedSkin": false,
        "UIProfile": 0,
    });

    match claims {
        Value::Object(map) => map,
        _ => unreachable!("json! object literal"),
    }
}

/// Merge user-supplied overrides into the defaults; overrides win.
pub fn merge_overrides(claims: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        claims.insert(key.clone(), value.clone());
    }
}
