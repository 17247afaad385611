//! Port interfaces for the session and transport layers
//!
//! These traits define the boundaries between core orchestration and the
//! infrastructure that persists credentials, talks to the auth service and
//! performs navigation.

use async_trait::async_trait;
use tripdesk_domain::constants::{AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use tripdesk_domain::{
    ApiResult, LoginPayload, RefreshPayload, Result, TripdeskError, UserProfile,
    ValidationPayload,
};

/// Key/value store holding the persisted session.
///
/// The session manager is the only writer. The transport's auth interceptor
/// only ever reads the token. Implementations provide the raw item
/// operations; the typed accessors are derived from them.
pub trait CredentialStore: Send + Sync {
    /// Read a raw item
    fn item(&self, key: &str) -> Option<String>;

    /// Write a raw item
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a single item
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every item, credentials and preferences alike
    fn clear(&self) -> Result<()>;

    fn token(&self) -> Option<String> {
        self.item(AUTH_TOKEN_KEY)
    }

    fn set_token(&self, token: &str) -> Result<()> {
        self.set_item(AUTH_TOKEN_KEY, token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.item(REFRESH_TOKEN_KEY)
    }

    fn set_refresh_token(&self, refresh_token: &str) -> Result<()> {
        self.set_item(REFRESH_TOKEN_KEY, refresh_token)
    }

    /// Stored user record; an unparseable record reads as absent.
    fn user(&self) -> Option<UserProfile> {
        self.item(USER_KEY).and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn set_user(&self, user: &UserProfile) -> Result<()> {
        let raw = serde_json::to_string(user)
            .map_err(|e| TripdeskError::Storage(format!("failed to serialize user: {e}")))?;
        self.set_item(USER_KEY, &raw)
    }

    /// Remove token, refresh token and user, leaving preferences in place.
    fn clear_credentials(&self) -> Result<()> {
        self.remove_item(AUTH_TOKEN_KEY)?;
        self.remove_item(REFRESH_TOKEN_KEY)?;
        self.remove_item(USER_KEY)
    }
}

/// Performs forced navigation (hard redirects) in the host.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Calls to the auth service used by the session manager
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange email and password for a credential set
    async fn login(&self, email: &str, password: &str) -> ApiResult<LoginPayload>;

    /// Check the currently persisted token with the backend
    async fn validate(&self) -> ApiResult<ValidationPayload>;

    /// Trade a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> ApiResult<RefreshPayload>;

    /// Revoke the current token
    async fn logout(&self) -> ApiResult<()>;
}
