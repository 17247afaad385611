use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::sleep;
use tripdesk_common::auth::{has_bypass_marker, unsigned_token, TokenClaims};
use tripdesk_common::time::{Clock, MockClock};
use tripdesk_domain::{
    ApiResult, AuthBypassConfig, LoginPayload, NormalizedError, RefreshPayload, Result,
    SessionPhase, UserProfile, ValidationPayload,
};

use super::*;
use crate::ports::{AuthBackend, CredentialStore, Navigator};

#[derive(Default)]
struct TestStore {
    items: Mutex<HashMap<String, String>>,
}

impl CredentialStore for TestStore {
    fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.items.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
struct TestNavigator {
    visits: Mutex<Vec<String>>,
}

impl TestNavigator {
    fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }
}

impl Navigator for TestNavigator {
    fn navigate(&self, path: &str) {
        self.visits.lock().push(path.to_string());
    }
}

struct MockBackend {
    login: Mutex<ApiResult<LoginPayload>>,
    validate: Mutex<ApiResult<ValidationPayload>>,
    refresh: Mutex<ApiResult<RefreshPayload>>,
    logout: Mutex<ApiResult<()>>,
    refresh_delay: Mutex<Duration>,
    login_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            login: Mutex::new(Err(NormalizedError::new("Unauthorized", 401))),
            validate: Mutex::new(Ok(ValidationPayload { success: true })),
            refresh: Mutex::new(Err(NormalizedError::new("Unauthorized", 401))),
            logout: Mutex::new(Ok(())),
            refresh_delay: Mutex::new(Duration::ZERO),
            login_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn login(&self, _email: &str, _password: &str) -> ApiResult<LoginPayload> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.lock().clone()
    }

    async fn validate(&self) -> ApiResult<ValidationPayload> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validate.lock().clone()
    }

    async fn refresh(&self, _refresh_token: &str) -> ApiResult<RefreshPayload> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        self.refresh.lock().clone()
    }

    async fn logout(&self) -> ApiResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout.lock().clone()
    }
}

struct Harness {
    session: SessionManager,
    backend: Arc<MockBackend>,
    store: Arc<TestStore>,
    navigator: Arc<TestNavigator>,
    clock: Arc<MockClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    fn with_config(config: SessionConfig) -> Self {
        Self::sharing_store(config, Arc::new(TestStore::default()))
    }

    fn sharing_store(config: SessionConfig, store: Arc<TestStore>) -> Self {
        let backend = Arc::new(MockBackend::new());
        let navigator = Arc::new(TestNavigator::default());
        let clock = Arc::new(MockClock::new());
        let session = SessionManager::with_clock(
            backend.clone(),
            store.clone(),
            navigator.clone(),
            config,
            clock.clone(),
        );
        Self { session, backend, store, navigator, clock }
    }

    fn token_expiring_in(&self, secs: i64) -> String {
        let exp = self.clock.epoch_seconds() + secs;
        unsigned_token(&TokenClaims {
            sub: Some("7".into()),
            exp: Some(u64::try_from(exp).unwrap()),
            ..TokenClaims::default()
        })
        .unwrap()
    }

    fn persist(&self, token: &str) {
        self.store.set_token(token).unwrap();
        self.store.set_refresh_token("refresh-1").unwrap();
        self.store.set_user(&user()).unwrap();
    }

    fn login_returns(&self, payload: LoginPayload) {
        *self.backend.login.lock() = Ok(payload);
    }

    fn refresh_returns(&self, token: String) {
        *self.backend.refresh.lock() =
            Ok(RefreshPayload { token: Some(token), refresh_token: None, user_info: None });
    }
}

fn user() -> UserProfile {
    serde_json::from_value(json!({"id": 7, "email": "ops@tripdesk.io", "role": "admin"})).unwrap()
}

fn full_login(token: String) -> LoginPayload {
    LoginPayload {
        user_info: Some(user()),
        token: Some(token),
        refresh_token: Some("refresh-1".into()),
    }
}

fn bypass_config(allowed_email: Option<&str>) -> SessionConfig {
    SessionConfig {
        bypass: AuthBypassConfig {
            enabled: true,
            allowed_email: allowed_email.map(str::to_string),
            default_role: "admin".into(),
        },
        ..SessionConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn login_persists_and_adopts_credentials() {
    let h = Harness::new();
    let token = h.token_expiring_in(3600);
    h.login_returns(full_login(token.clone()));

    assert!(h.session.login("ops@tripdesk.io", "secret").await);

    let state = h.session.snapshot();
    assert!(state.is_authenticated());
    assert_eq!(state.token.as_deref(), Some(token.as_str()));
    assert_eq!(h.store.token(), Some(token));
    assert_eq!(h.store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(h.store.user(), Some(user()));
    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn login_without_token_fails_and_clears_store() {
    let h = Harness::new();
    h.persist("stale-token");
    h.login_returns(LoginPayload {
        user_info: Some(user()),
        token: None,
        refresh_token: Some("refresh-1".into()),
    });

    assert!(!h.session.login("ops@tripdesk.io", "secret").await);

    assert!(!h.session.is_authenticated());
    assert_eq!(h.store.token(), None);
    assert_eq!(h.store.user(), None);
    assert_eq!(h.store.refresh_token(), None);
}

#[tokio::test(start_paused = true)]
async fn login_backend_error_returns_false() {
    let h = Harness::new();

    assert!(!h.session.login("ops@tripdesk.io", "wrong").await);
    assert_eq!(MockBackend::calls(&h.backend.login_calls), 1);
    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_without_persisted_session_stays_unauthenticated() {
    let h = Harness::new();

    assert!(!h.session.bootstrap().await);
    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(MockBackend::calls(&h.backend.validate_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_adopts_and_validates_persisted_session() {
    let h = Harness::new();
    let token = h.token_expiring_in(3600);
    h.persist(&token);

    assert!(h.session.bootstrap().await);

    let state = h.session.snapshot();
    assert_eq!(state.token, Some(token));
    assert_eq!(state.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(state.user, Some(user()));
    assert_eq!(MockBackend::calls(&h.backend.validate_calls), 1);
    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_rejected_by_backend_logs_out() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(3600));
    *h.backend.validate.lock() = Ok(ValidationPayload { success: false });

    assert!(!h.session.bootstrap().await);

    assert!(!h.session.is_authenticated());
    assert_eq!(h.store.token(), None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
    assert_eq!(MockBackend::calls(&h.backend.logout_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_validation_error_logs_out() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(3600));
    *h.backend.validate.lock() = Err(NormalizedError::network("connection refused"));

    assert!(!h.session.bootstrap().await);
    assert_eq!(h.store.token(), None);
    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn login_then_reload_restores_same_session() {
    let store = Arc::new(TestStore::default());
    let first = Harness::sharing_store(SessionConfig::default(), store.clone());
    first.login_returns(full_login(first.token_expiring_in(3600)));
    assert!(first.session.login("ops@tripdesk.io", "secret").await);
    first.session.shutdown();

    let reloaded = Harness::sharing_store(SessionConfig::default(), store);
    assert!(reloaded.session.bootstrap().await);

    assert_eq!(reloaded.session.snapshot(), first.session.snapshot());
    assert!(reloaded.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn logout_clears_everything_even_when_revoke_fails() {
    let h = Harness::new();
    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    h.store.set_item("theme_id", "dark").unwrap();
    *h.backend.logout.lock() = Err(NormalizedError::network("offline"));

    h.session.logout().await;

    assert!(!h.session.is_authenticated());
    assert_eq!(h.store.token(), None);
    assert_eq!(h.store.item("theme_id"), None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
    assert_eq!(MockBackend::calls(&h.backend.logout_calls), 1);

    h.session.logout().await;
    assert_eq!(h.navigator.visits().len(), 2);
    assert_eq!(MockBackend::calls(&h.backend.logout_calls), 1);
    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn refresh_without_refresh_token_logs_out() {
    let h = Harness::new();
    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    h.store.remove_item("refresh_token").unwrap();

    assert!(!h.session.refresh_token().await);

    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 0);
    assert!(!h.session.is_authenticated());
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn refresh_adopts_new_token_and_keeps_refresh_token() {
    let h = Harness::new();
    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    let fresh = h.token_expiring_in(7200);
    h.refresh_returns(fresh.clone());

    assert!(h.session.refresh_token().await);

    let state = h.session.snapshot();
    assert_eq!(state.token.as_deref(), Some(fresh.as_str()));
    assert_eq!(state.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(h.store.token(), Some(fresh));
    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn refresh_finishing_after_logout_is_discarded() {
    let h = Harness::new();
    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    h.refresh_returns(h.token_expiring_in(7200));
    *h.backend.refresh_delay.lock() = Duration::from_secs(2);

    let pending = tokio::spawn({
        let session = h.session.clone();
        async move { session.refresh_token().await }
    });
    sleep(Duration::from_millis(500)).await;
    h.session.logout().await;

    assert!(!pending.await.unwrap());
    assert_eq!(h.store.token(), None);
    assert_eq!(h.store.refresh_token(), None);
    let state = h.session.snapshot();
    assert_eq!(state.token, None);
    assert_eq!(state.user, None);
    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_without_token_in_response_logs_out() {
    let h = Harness::new();
    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    *h.backend.refresh.lock() = Ok(RefreshPayload::default());

    assert!(!h.session.refresh_token().await);

    assert_eq!(h.store.token(), None);
    assert_eq!(h.session.snapshot().token, None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn watchdog_refreshes_token_nearing_expiry_once() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(120));
    h.refresh_returns(h.token_expiring_in(3600));

    assert!(h.session.bootstrap().await);
    sleep(Duration::from_secs(61)).await;

    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 1);
    assert!(h.session.is_authenticated());
    assert!(h.navigator.visits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn watchdog_logs_out_expired_token_without_refreshing() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(-30));
    h.refresh_returns(h.token_expiring_in(3600));

    h.session.bootstrap().await;
    sleep(Duration::from_secs(61)).await;

    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 0);
    assert!(!h.session.is_authenticated());
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn watchdog_ignores_tokens_without_claims() {
    let h = Harness::new();
    h.persist("opaque-token");

    assert!(h.session.bootstrap().await);
    sleep(Duration::from_secs(180)).await;

    assert_eq!(h.session.check_expiry().await, ExpiryCheck::Undecodable);
    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 0);
    assert!(h.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn watchdog_rereads_live_token_each_tick() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(400));
    h.refresh_returns(h.token_expiring_in(3600));

    assert!(h.session.bootstrap().await);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 0);

    h.clock.advance_secs(200);
    sleep(Duration::from_secs(60)).await;

    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_watchdog() {
    let h = Harness::new();
    h.persist(&h.token_expiring_in(3600));
    assert!(h.session.bootstrap().await);
    sleep(Duration::from_secs(1)).await;

    h.session.shutdown();
    h.clock.advance_secs(3500);
    sleep(Duration::from_secs(300)).await;

    assert_eq!(MockBackend::calls(&h.backend.refresh_calls), 0);
    assert!(h.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn check_expiry_reports_healthy_and_idle() {
    let h = Harness::new();
    assert_eq!(h.session.check_expiry().await, ExpiryCheck::Idle);

    h.login_returns(full_login(h.token_expiring_in(3600)));
    assert!(h.session.login("ops@tripdesk.io", "secret").await);
    assert_eq!(h.session.check_expiry().await, ExpiryCheck::Healthy);
}

#[tokio::test(start_paused = true)]
async fn bypass_login_mints_marked_token_without_backend() {
    let h = Harness::with_config(bypass_config(Some("dev@tripdesk.io")));

    assert!(h.session.login("DEV@tripdesk.io", "anything").await);

    let token = h.store.token().unwrap();
    assert!(has_bypass_marker(&token));
    assert_eq!(MockBackend::calls(&h.backend.login_calls), 0);
    assert_eq!(h.session.snapshot().user.and_then(|u| u.role).as_deref(), Some("admin"));

    h.session.logout().await;
    assert_eq!(MockBackend::calls(&h.backend.logout_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn bypass_is_limited_to_allowed_email() {
    let h = Harness::with_config(bypass_config(Some("dev@tripdesk.io")));

    assert!(!h.session.login("ops@tripdesk.io", "secret").await);
    assert_eq!(MockBackend::calls(&h.backend.login_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn bypass_marker_skips_validation_only_when_enabled() {
    let store = Arc::new(TestStore::default());
    let minting = Harness::sharing_store(bypass_config(None), store.clone());
    assert!(minting.session.login("dev@tripdesk.io", "x").await);
    minting.session.shutdown();

    let enabled = Harness::sharing_store(bypass_config(None), store.clone());
    assert!(enabled.session.bootstrap().await);
    assert_eq!(MockBackend::calls(&enabled.backend.validate_calls), 0);
    enabled.session.shutdown();

    let disabled = Harness::sharing_store(SessionConfig::default(), store);
    *disabled.backend.validate.lock() = Err(NormalizedError::new("Unauthorized", 401));
    assert!(!disabled.session.bootstrap().await);
    assert_eq!(MockBackend::calls(&disabled.backend.validate_calls), 1);
    assert_eq!(disabled.store.token(), None);
}

#[tokio::test(start_paused = true)]
async fn phase_changes_are_observable() {
    let h = Harness::new();
    let mut phases = h.session.subscribe();
    h.login_returns(full_login(h.token_expiring_in(3600)));

    h.session.login("ops@tripdesk.io", "secret").await;
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Authenticated);

    h.session.logout().await;
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Unauthenticated);
}
