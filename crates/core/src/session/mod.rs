//! Session lifecycle management
//!
//! [`SessionManager`] owns the authenticated identity for the process:
//! bootstrapping it from the credential store, validating it with the auth
//! service, logging in and out, and refreshing the access token before it
//! expires. It is the only writer of persisted credentials.

mod watchdog;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tripdesk_common::auth::{self, TokenClaims};
use tripdesk_common::time::{Clock, SystemClock};
use tripdesk_domain::constants::LOGIN_PATH;
use tripdesk_domain::{
    AuthBypassConfig, Credentials, RefreshedTokens, Result, SessionPhase, SessionState,
    TripdeskError, UserProfile,
};

use crate::ports::{AuthBackend, CredentialStore, Navigator};

pub use watchdog::ExpiryCheck;

/// Timing and bypass settings for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the expiry watchdog
    pub watchdog_period: Duration,
    /// Refresh proactively once less than this much validity remains
    pub refresh_window: Duration,
    /// Lifetime of tokens minted by the development bypass
    pub bypass_token_ttl: Duration,
    pub bypass: AuthBypassConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            watchdog_period: Duration::from_secs(60),
            refresh_window: Duration::from_secs(5 * 60),
            bypass_token_ttl: Duration::from_secs(24 * 60 * 60),
            bypass: AuthBypassConfig::default(),
        }
    }
}

/// Owner of the current session.
///
/// Cloning is cheap and yields a handle to the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    phase: watch::Sender<SessionPhase>,
    /// Current token identity; the watchdog re-arms whenever it changes
    token_tx: watch::Sender<Option<String>>,
    refresh_lock: Mutex<()>,
    watchdog_started: AtomicBool,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(backend, store, navigator, config, Arc::new(SystemClock))
    }

    /// Create a manager driven by a custom clock (useful for testing)
    pub fn with_clock(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Unauthenticated);
        let (token_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                backend,
                store,
                navigator,
                clock,
                config,
                state: RwLock::new(SessionState::default()),
                phase,
                token_tx,
                refresh_lock: Mutex::new(()),
                watchdog_started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Restore the session from persisted credentials.
    ///
    /// Stored credentials are adopted optimistically, then validated with the
    /// backend. A rejected or failed validation logs the session out.
    /// Returns whether a session is live afterwards.
    #[instrument(skip(self), fields(source = "session"))]
    pub async fn bootstrap(&self) -> bool {
        let inner = &self.inner;
        inner.set_phase(SessionPhase::Bootstrapping);

        let (Some(token), Some(user)) = (inner.store.token(), inner.store.user()) else {
            debug!(source = "session", "no persisted session");
            inner.set_phase(SessionPhase::Unauthenticated);
            return false;
        };

        let refresh_token = inner.store.refresh_token();
        inner.adopt(SessionState {
            user: Some(user),
            token: Some(token.clone()),
            refresh_token,
        });
        self.ensure_watchdog();

        if auth::has_bypass_marker(&token) {
            if inner.config.bypass.enabled {
                info!(source = "session", "development bypass session restored without validation");
                inner.set_phase(SessionPhase::Authenticated);
                return true;
            }
            warn!(source = "session", "bypass token found while bypass is disabled, validating");
        }

        match inner.backend.validate().await {
            Ok(validation) if validation.success => {
                info!(source = "session", "persisted session validated");
                inner.set_phase(SessionPhase::Authenticated);
                true
            }
            Ok(_) => {
                warn!(source = "session", "backend rejected persisted session");
                inner.logout().await;
                false
            }
            Err(err) => {
                warn!(source = "session", status = err.status, error = %err.message, "session validation failed");
                inner.logout().await;
                false
            }
        }
    }

    /// Log in with email and password.
    ///
    /// Failure of any kind clears residual credentials and returns `false`.
    #[instrument(skip(self, password), fields(source = "session"))]
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let inner = &self.inner;

        if inner.config.bypass.permits(email) {
            return self.login_with_bypass(email);
        }

        let credentials = match inner.backend.login(email, password).await {
            Ok(payload) => match payload.into_credentials() {
                Ok(credentials) => credentials,
                Err(err) => {
                    warn!(source = "session", error = %err, "login response incomplete");
                    inner.clear_local();
                    return false;
                }
            },
            Err(err) => {
                warn!(source = "session", status = err.status, error = %err.message, "login failed");
                inner.clear_local();
                return false;
            }
        };

        if let Err(err) = inner.persist_credentials(&credentials) {
            warn!(source = "session", error = %err, "failed to persist credentials");
            inner.clear_local();
            return false;
        }

        inner.adopt(SessionState::from(credentials));
        inner.set_phase(SessionPhase::Authenticated);
        self.ensure_watchdog();
        info!(source = "session", "login succeeded");
        true
    }

    /// Log out locally, revoking the token with the backend on a best-effort
    /// basis, and navigate to the login page. Safe to call repeatedly.
    pub async fn logout(&self) {
        self.inner.logout().await;
    }

    /// Exchange the persisted refresh token for a new access token.
    ///
    /// Either the full new token set is adopted, or the session is logged out.
    /// Returns whether a session is live afterwards.
    pub async fn refresh_token(&self) -> bool {
        self.inner.refresh_token().await
    }

    /// Run one expiry check immediately, outside the watchdog's schedule.
    pub async fn check_expiry(&self) -> ExpiryCheck {
        self.inner.check_expiry().await
    }

    /// Current in-memory session.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    /// Observe lifecycle phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    /// Stop the expiry watchdog. The session itself is left untouched.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    fn login_with_bypass(&self, email: &str) -> bool {
        let inner = &self.inner;
        let now = u64::try_from(inner.clock.epoch_seconds()).unwrap_or_default();
        let role = inner.config.bypass.default_role.clone();
        let claims = TokenClaims {
            sub: Some(format!("bypass:{email}")),
            email: Some(email.to_string()),
            role: Some(role.clone()),
            exp: Some(now + inner.config.bypass_token_ttl.as_secs()),
            iat: Some(now),
            bypass: true,
            ..TokenClaims::default()
        };

        let token = match auth::unsigned_token(&claims) {
            Ok(token) => token,
            Err(err) => {
                warn!(source = "session", error = %err, "failed to mint bypass token");
                inner.clear_local();
                return false;
            }
        };

        let credentials = Credentials {
            user: UserProfile {
                id: format!("bypass:{email}"),
                email: email.to_string(),
                name: None,
                role: Some(role),
                extra: serde_json::Map::new(),
            },
            token,
            refresh_token: format!("bypass-refresh:{now}"),
        };

        if let Err(err) = inner.persist_credentials(&credentials) {
            warn!(source = "session", error = %err, "failed to persist bypass credentials");
            inner.clear_local();
            return false;
        }

        warn!(source = "session", "development auth bypass used; token is unsigned");
        inner.adopt(SessionState::from(credentials));
        inner.set_phase(SessionPhase::Authenticated);
        self.ensure_watchdog();
        true
    }

    fn ensure_watchdog(&self) {
        if self.inner.watchdog_started.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(watchdog::run(
            Arc::downgrade(&self.inner),
            self.inner.token_tx.subscribe(),
            self.inner.shutdown.clone(),
            self.inner.config.watchdog_period,
        ));
    }
}

impl SessionInner {
    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            debug!(source = "session", from = %current, to = %phase, "session phase change");
            *current = phase;
            true
        });
    }

    /// Replace the in-memory session and publish the token identity.
    fn adopt(&self, next: SessionState) {
        let token = next.token.clone();
        *self.state.write() = next;
        self.publish_token(token);
    }

    fn publish_token(&self, token: Option<String>) {
        self.token_tx.send_if_modified(|current| {
            if *current == token {
                return false;
            }
            *current = token;
            true
        });
    }

    fn persist_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.store.set_token(&credentials.token)?;
        self.store.set_refresh_token(&credentials.refresh_token)?;
        self.store.set_user(&credentials.user)
    }

    fn persist_refreshed(&self, tokens: &RefreshedTokens) -> Result<()> {
        self.store.set_token(&tokens.token)?;
        if let Some(refresh_token) = &tokens.refresh_token {
            self.store.set_refresh_token(refresh_token)?;
        }
        if let Some(user) = &tokens.user {
            self.store.set_user(user)?;
        }
        Ok(())
    }

    /// Wipe persisted and in-memory credentials without contacting anyone.
    fn clear_local(&self) {
        {
            let mut state = self.state.write();
            if let Err(err) = self.store.clear() {
                warn!(source = "session", error = %err, "failed to clear credential store");
            }
            *state = SessionState::default();
        }
        self.publish_token(None);
        self.set_phase(SessionPhase::Unauthenticated);
    }

    async fn logout(&self) {
        self.set_phase(SessionPhase::LoggingOut);

        let token = self.state.read().token.clone();
        match token {
            Some(token) if !auth::has_bypass_marker(&token) => {
                if let Err(err) = self.backend.logout().await {
                    warn!(source = "session", status = err.status, error = %err.message, "logout request failed");
                }
            }
            Some(_) => debug!(source = "session", "bypass session, skipping logout request"),
            None => debug!(source = "session", "no live token, skipping logout request"),
        }

        self.clear_local();
        self.navigator.navigate(LOGIN_PATH);
        info!(source = "session", "logged out");
    }

    async fn refresh_token(&self) -> bool {
        let observed = self.state.read().token.clone();
        let _guard = self.refresh_lock.lock().await;

        // A refresh that completed while we waited already did the work.
        if self.state.read().token != observed {
            debug!(source = "session", "token changed while waiting, skipping refresh");
            return self.state.read().is_authenticated();
        }

        let Some(refresh_token) = self.store.refresh_token() else {
            warn!(source = "session", "no refresh token available");
            self.logout().await;
            return false;
        };

        self.set_phase(SessionPhase::Refreshing);
        let tokens = match self.backend.refresh(&refresh_token).await {
            Ok(payload) => payload.into_tokens().map_err(|e| TripdeskError::Auth(e.to_string())),
            Err(err) => Err(TripdeskError::Auth(err.message)),
        };

        // Checked and applied under the state lock so a logout or login that
        // landed during the backend call is never overwritten.
        let applied = {
            let mut state = self.state.write();
            if state.token != observed {
                drop(state);
                debug!(source = "session", "session changed during refresh, discarding result");
                return self.state.read().is_authenticated();
            }
            tokens.and_then(|tokens| {
                self.persist_refreshed(&tokens)?;
                state.token = Some(tokens.token);
                if let Some(refresh_token) = tokens.refresh_token {
                    state.refresh_token = Some(refresh_token);
                }
                if let Some(user) = tokens.user {
                    state.user = Some(user);
                }
                Ok(state.token.clone())
            })
        };

        match applied {
            Ok(token) => {
                self.publish_token(token);
                self.set_phase(SessionPhase::Authenticated);
                info!(source = "session", "token refreshed");
                true
            }
            Err(err) => {
                warn!(source = "session", error = %err, "token refresh failed");
                self.logout().await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests;
