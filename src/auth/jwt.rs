//! User id extraction from a JWT payload.
//!
//! The signature is not verified; the id only keys client-side caches and
//! rate accounting.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// Identity used when no user can be derived from the token.
pub const ANONYMOUS: &str = "anonymous";

/// Claims checked for a user id, in order.
const USER_ID_CLAIMS: [&str; 4] = ["userId", "id", "_id", "sub"];

/// Decode the user id from a token's payload segment.
///
/// Total: any malformed input yields [`ANONYMOUS`].
pub fn decode_payload_user_id(token: &str) -> String {
    payload_user_id(token).unwrap_or_else(|| ANONYMOUS.to_string())
}

/// User id for an optional token.
pub fn user_id_for(token: Option<&str>) -> String {
    token
        .map(decode_payload_user_id)
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

fn payload_user_id(token: &str) -> Option<String> {
    let segment = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    let payload: Value = serde_json::from_slice(&bytes).ok()?;

    USER_ID_CLAIMS.iter().find_map(|claim| match payload.get(*claim)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
