//! Session and auth endpoint types
//!
//! Backend auth responses are validated here, at the boundary, into the
//! strongly typed [`Credentials`] / [`RefreshedTokens`] values the session
//! manager adopts. A payload that is missing any required piece is rejected
//! as a whole; there is no partial adoption.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::impl_domain_status_conversions;

/// Profile of the signed-in operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Remaining profile fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Complete credential set produced by a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
}

/// In-memory view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

impl From<Credentials> for SessionState {
    fn from(credentials: Credentials) -> Self {
        Self {
            user: Some(credentials.user),
            token: Some(credentials.token),
            refresh_token: Some(credentials.refresh_token),
        }
    }
}

/// Lifecycle phase of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    Bootstrapping,
    Authenticated,
    Refreshing,
    LoggingOut,
}

impl_domain_status_conversions!(SessionPhase {
    Unauthenticated => "unauthenticated",
    Bootstrapping => "bootstrapping",
    Authenticated => "authenticated",
    Refreshing => "refreshing",
    LoggingOut => "logging_out",
});

/// Rejection of a structurally incomplete auth payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Authentication failed: missing token or user info")]
    MissingCredentials,

    #[error("Token refresh failed: missing token")]
    MissingToken,
}

/// Body sent to the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body sent to the refresh endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Raw login response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[serde(default)]
    pub user_info: Option<UserProfile>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl LoginPayload {
    /// Validate that user, token and refresh token are all present.
    ///
    /// # Errors
    /// [`PayloadError::MissingCredentials`] if any of the three is absent or
    /// the token is empty.
    pub fn into_credentials(self) -> Result<Credentials, PayloadError> {
        match (self.user_info, self.token, self.refresh_token) {
            (Some(user), Some(token), Some(refresh_token))
                if !token.is_empty() && !refresh_token.is_empty() =>
            {
                Ok(Credentials { user, token, refresh_token })
            }
            _ => Err(PayloadError::MissingCredentials),
        }
    }
}

/// Raw refresh response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_info: Option<UserProfile>,
}

/// Token set adopted after a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedTokens {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl RefreshPayload {
    /// # Errors
    /// [`PayloadError::MissingToken`] when no access token was issued.
    pub fn into_tokens(self) -> Result<RefreshedTokens, PayloadError> {
        match self.token {
            Some(token) if !token.is_empty() => Ok(RefreshedTokens {
                token,
                refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
                user: self.user_info,
            }),
            _ => Err(PayloadError::MissingToken),
        }
    }
}

/// Response of the token validation endpoint.
///
/// Any 2xx reply counts as valid unless the body says `success: false`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationPayload {
    #[serde(default = "accepted", alias = "valid")]
    pub success: bool,
}

impl Default for ValidationPayload {
    fn default() -> Self {
        Self { success: accepted() }
    }
}

fn accepted() -> bool {
    true
}

/// Explicit response schema shared by the backend services.
///
/// Services either wrap the result in `{ "data": ..., "success": ..., "message": ... }`
/// or return it directly. Deserialization picks the variant once, at the
/// boundary, instead of each caller probing for a `data` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiPayload<T> {
    Enveloped {
        data: T,
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        message: Option<String>,
    },
    Direct(T),
}

impl<T> ApiPayload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Enveloped { data, .. } | Self::Direct(data) => data,
        }
    }
}
