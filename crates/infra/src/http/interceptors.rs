//! Interceptor pipeline for the transport client
//!
//! Three ordered chains: request interceptors run before dispatch, response
//! interceptors after a successful attempt, error interceptors once all
//! attempts are exhausted. Registration order is application order, and the
//! chains only ever grow.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use tripdesk_core::ports::{CredentialStore, Navigator};
use tripdesk_domain::constants::LOGIN_PATH;
use tripdesk_domain::{NormalizedError, RequestSpec, ResponseEnvelope};

/// Transform applied to every outgoing request.
pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, request: RequestSpec) -> RequestSpec;
}

/// Transform applied to every successful response.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, response: ResponseEnvelope) -> ResponseEnvelope;
}

/// Transform applied to a failure before it reaches the caller.
///
/// Returning a different error replaces it for the rest of the chain.
pub trait ErrorInterceptor: Send + Sync {
    fn on_error(&self, error: NormalizedError) -> NormalizedError;
}

impl<F> RequestInterceptor for F
where
    F: Fn(RequestSpec) -> RequestSpec + Send + Sync,
{
    fn on_request(&self, request: RequestSpec) -> RequestSpec {
        self(request)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(ResponseEnvelope) -> ResponseEnvelope + Send + Sync,
{
    fn on_response(&self, response: ResponseEnvelope) -> ResponseEnvelope {
        self(response)
    }
}

impl<F> ErrorInterceptor for F
where
    F: Fn(NormalizedError) -> NormalizedError + Send + Sync,
{
    fn on_error(&self, error: NormalizedError) -> NormalizedError {
        self(error)
    }
}

/// Ordered, append-only interceptor chains.
#[derive(Default)]
pub struct Interceptors {
    request: RwLock<Vec<Arc<dyn RequestInterceptor>>>,
    response: RwLock<Vec<Arc<dyn ResponseInterceptor>>>,
    error: RwLock<Vec<Arc<dyn ErrorInterceptor>>>,
}

impl Interceptors {
    pub fn add_request(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.write().push(interceptor);
    }

    pub fn add_response(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.write().push(interceptor);
    }

    pub fn add_error(&self, interceptor: Arc<dyn ErrorInterceptor>) {
        self.error.write().push(interceptor);
    }

    /// Number of registered (request, response, error) interceptors.
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.request.read().len(), self.response.read().len(), self.error.read().len())
    }

    pub(crate) fn apply_request(&self, request: RequestSpec) -> RequestSpec {
        let chain = self.request.read().clone();
        chain.iter().fold(request, |request, interceptor| interceptor.on_request(request))
    }

    pub(crate) fn apply_response(&self, response: ResponseEnvelope) -> ResponseEnvelope {
        let chain = self.response.read().clone();
        chain.iter().fold(response, |response, interceptor| interceptor.on_response(response))
    }

    pub(crate) fn apply_error(&self, error: NormalizedError) -> NormalizedError {
        let chain = self.error.read().clone();
        chain.iter().fold(error, |error, interceptor| interceptor.on_error(error))
    }
}

/// Injects `Authorization: Bearer <token>` from the credential store.
///
/// Requests flagged `skip_auth`, or that already carry an authorization
/// header, are left untouched. The store is only ever read.
pub struct AuthHeaderInterceptor {
    store: Arc<dyn CredentialStore>,
}

impl AuthHeaderInterceptor {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl RequestInterceptor for AuthHeaderInterceptor {
    fn on_request(&self, mut request: RequestSpec) -> RequestSpec {
        if request.skip_auth
            || request.headers.keys().any(|name| name.eq_ignore_ascii_case("authorization"))
        {
            return request;
        }

        if let Some(token) = self.store.token() {
            request.headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        request
    }
}

/// On a 401, wipes persisted credentials and forces navigation to the login
/// page. The error itself is passed through unchanged.
pub struct UnauthorizedInterceptor {
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
}

impl UnauthorizedInterceptor {
    pub fn new(store: Arc<dyn CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { store, navigator }
    }
}

impl ErrorInterceptor for UnauthorizedInterceptor {
    fn on_error(&self, error: NormalizedError) -> NormalizedError {
        if !error.is_unauthorized() {
            return error;
        }

        warn!(source = "transport", "unauthorized response, clearing session");
        if let Err(err) = self.store.clear_credentials() {
            warn!(source = "transport", error = %err, "failed to clear credentials");
        }
        debug!(source = "transport", path = LOGIN_PATH, "redirecting to login");
        self.navigator.navigate(LOGIN_PATH);
        error
    }
}
