//! Identity helpers: the reserved anonymous id and JWT payload decoding.
//!
//! Tokens are decoded, never verified. Signature checks belong to whatever
//! issues and accepts them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthData;

/// The reserved unauthenticated identity.
pub const ANON_USER_ID: &str = "anon";

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Decode the `sub` claim of a JWT. Missing, malformed or empty claims
/// yield `None`.
pub fn auth_data_from_token(token: &str) -> Option<AuthData> {
    let mut parts = token.trim().split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    parts.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.sub.filter(|s| !s.is_empty()).map(AuthData::new)
}

/// The user id carried by `token`, or [`ANON_USER_ID`].
pub fn user_id_from_token(token: Option<&str>) -> String {
    token
        .and_then(auth_data_from_token)
        .map(|auth| auth.sub)
        .unwrap_or_else(|| ANON_USER_ID.to_string())
}

/// An unsigned development token (`alg: none`) for `sub`.
pub fn mint_unsigned_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "none", "typ": "JWT" }).to_string());
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": sub }).to_string());
    format!("{header}.{payload}.")
}
