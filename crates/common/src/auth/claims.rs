//! Bearer token claim inspection
//!
//! Tokens are treated as opaque JWT-shaped strings. Signatures are never
//! verified here: the backend owns that. The client only needs to read the
//! `exp` claim to schedule refreshes and detect locally-minted dev tokens.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding token claims
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("token payload is not valid JSON: {0}")]
    Json(String),
}

/// Claims carried in a bearer token payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiry, in seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Set only on tokens minted locally by the development bypass
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bypass: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TokenClaims {
    /// Seconds remaining until `exp`, negative once expired.
    ///
    /// Returns `None` when the token carries no expiry.
    pub fn seconds_until_expiry(&self, now_epoch_secs: u64) -> Option<i64> {
        self.exp.map(|exp| exp as i64 - now_epoch_secs as i64)
    }
}

/// Decode the payload segment of `token` without verifying its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClaimsError::Encoding(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
}

/// Convenience wrapper: seconds until expiry, or `None` if the token cannot
/// be decoded or has no `exp`.
pub fn seconds_until_expiry(token: &str, now_epoch_secs: u64) -> Option<i64> {
    decode_claims(token).ok()?.seconds_until_expiry(now_epoch_secs)
}

/// True when `token` decodes and carries the development bypass marker.
pub fn has_bypass_marker(token: &str) -> bool {
    decode_claims(token).map(|claims| claims.bypass).unwrap_or(false)
}

/// Build an unsigned (`alg: none`) token carrying `claims`.
///
/// Only used for locally-minted development sessions; no backend accepts it.
pub fn unsigned_token(claims: &TokenClaims) -> Result<String, ClaimsError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = serde_json::to_vec(claims).map_err(|e| ClaimsError::Json(e.to_string()))?;
    Ok(format!("{header}.{}.", URL_SAFE_NO_PAD.encode(body)))
}
