//! Token expiry watchdog
//!
//! One long-lived task per session manager. It idles while no token is live,
//! checks immediately whenever the token identity changes, then re-checks on
//! every period tick. Each check reads the live token; nothing is captured
//! from a previous tick.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tripdesk_common::auth;

use super::SessionInner;

/// Result of a single expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// No live token
    Idle,
    /// Token carries no readable expiry; left to the backend
    Undecodable,
    /// Outside the refresh window
    Healthy,
    /// Inside the refresh window; a refresh was attempted
    Refreshed { success: bool },
    /// Already expired; the session was logged out
    Expired,
}

pub(super) async fn run(
    session: Weak<SessionInner>,
    mut tokens: watch::Receiver<Option<String>>,
    shutdown: CancellationToken,
    period: Duration,
) {
    loop {
        let armed = tokens.borrow_and_update().is_some();
        if !armed {
            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = tokens.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        debug!(source = "session", "expiry watchdog armed");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(source = "session", "expiry watchdog stopped");
                    return;
                }
                changed = tokens.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let Some(session) = session.upgrade() else {
                        return;
                    };
                    session.check_expiry().await;
                }
            }
        }
    }
}

impl SessionInner {
    pub(super) async fn check_expiry(&self) -> ExpiryCheck {
        let Some(token) = self.state.read().token.clone() else {
            return ExpiryCheck::Idle;
        };

        let now = u64::try_from(self.clock.epoch_seconds()).unwrap_or_default();
        let remaining = match auth::decode_claims(&token) {
            Ok(claims) => claims.seconds_until_expiry(now),
            Err(err) => {
                debug!(source = "session", error = %err, "token expiry not readable, skipping check");
                return ExpiryCheck::Undecodable;
            }
        };
        let Some(remaining) = remaining else {
            debug!(source = "session", "token has no expiry claim, skipping check");
            return ExpiryCheck::Undecodable;
        };

        let window = i64::try_from(self.config.refresh_window.as_secs()).unwrap_or(i64::MAX);
        if remaining <= 0 {
            warn!(source = "session", expired_for_secs = -remaining, "token expired, logging out");
            self.logout().await;
            ExpiryCheck::Expired
        } else if remaining < window {
            info!(source = "session", remaining_secs = remaining, "token nearing expiry, refreshing");
            let success = self.refresh_token().await;
            ExpiryCheck::Refreshed { success }
        } else {
            ExpiryCheck::Healthy
        }
    }
}
