//! Per-domain service client
//!
//! A named, logged view over the shared [`TransportClient`]. Retry, cache
//! and interceptor behavior all live in the transport; this type only picks
//! the base URL and tags log lines with the service name.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use tripdesk_domain::{ApiPayload, ApiResult, HttpMethod, NormalizedError, ResponseEnvelope};

use crate::http::{join_url, RequestOptions, TransportClient};

/// Client for one backend service (auth, user, trip, journal, ...).
#[derive(Clone)]
pub struct ServiceClient {
    name: String,
    source: String,
    base_url: String,
    transport: Arc<TransportClient>,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    /// Client for the service `name` rooted at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<TransportClient>,
    ) -> Self {
        let name = name.into();
        Self { source: format!("service:{name}"), name, base_url: base_url.into(), transport }
    }

    /// Service name used in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `endpoint` on this service.
    pub fn url(&self, endpoint: &str) -> String {
        join_url(Some(&self.base_url), endpoint)
    }

    /// Issue a request with explicit options. All verbs funnel through here.
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<ResponseEnvelope> {
        debug!(source = %self.source, %method, endpoint, "calling service");
        let result = self.transport.request(method, &self.url(endpoint), options).await;
        match &result {
            Ok(response) => {
                debug!(source = %self.source, %method, endpoint, status = response.status, "service call succeeded");
            }
            Err(err) => {
                warn!(source = %self.source, %method, endpoint, status = err.status, error = %err.message, "service call failed");
            }
        }
        result
    }

    /// GET `endpoint` on this service.
    pub async fn get(&self, endpoint: &str) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Get, endpoint, RequestOptions::default()).await
    }

    /// POST `body` as JSON.
    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ApiResult<ResponseEnvelope> {
        let options = RequestOptions::default().json(encode_body(body)?);
        self.request(HttpMethod::Post, endpoint, options).await
    }

    /// PUT `body` as JSON.
    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> ApiResult<ResponseEnvelope> {
        let options = RequestOptions::default().json(encode_body(body)?);
        self.request(HttpMethod::Put, endpoint, options).await
    }

    /// DELETE `endpoint` on this service.
    pub async fn del(&self, endpoint: &str) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Delete, endpoint, RequestOptions::default()).await
    }

    /// GET with a query string built from `params`. `None` values are
    /// skipped and every value is percent-encoded.
    pub async fn get_with_query<I, K, V>(&self, endpoint: &str, params: I) -> ApiResult<ResponseEnvelope>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: ToString,
    {
        self.get(&with_query(endpoint, params)).await
    }

    /// GET and decode the body, unwrapping a `{ data: ... }` envelope if present.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let response = self.get(endpoint).await?;
        Ok(response.json::<ApiPayload<T>>()?.into_inner())
    }

    /// POST and decode the body, unwrapping a `{ data: ... }` envelope if present.
    pub async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(endpoint, body).await?;
        Ok(response.json::<ApiPayload<T>>()?.into_inner())
    }
}

/// Append `params` to `endpoint` as a query string.
pub fn with_query<I, K, V>(endpoint: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: ToString,
{
    let query = params
        .into_iter()
        .filter_map(|(key, value)| {
            value.map(|value| format!("{}={}", key.as_ref(), urlencoding::encode(&value.to_string())))
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        return endpoint.to_string();
    }
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{query}")
}

pub(crate) fn encode_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<serde_json::Value> {
    serde_json::to_value(body)
        .map_err(|err| NormalizedError::unknown(format!("Failed to serialize request body: {err}"), 0))
}
