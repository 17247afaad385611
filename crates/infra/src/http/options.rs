//! Per-call overrides for the transport defaults

use std::collections::BTreeMap;
use std::time::Duration;

use tripdesk_domain::{RequestBody, ResponseType};

/// Options for a single transport call.
///
/// Anything left as `None` falls back to the client's configured default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cache: Option<bool>,
    pub cache_ttl: Option<Duration>,
    pub skip_auth: bool,
    pub response_type: Option<ResponseType>,
}

impl RequestOptions {
    /// Options that inherit every client default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Send `body` as JSON.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Send an explicit request body.
    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry count.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Override the backoff base delay.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Serve GETs from the response cache when a valid entry exists.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cache = Some(true);
        self
    }

    /// Cache with a custom lifetime instead of the client default.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(true);
        self.cache_ttl = Some(ttl);
        self
    }

    /// Send without the bearer token.
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Decode the body as JSON, text or raw bytes.
    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }
}
