use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, debug_span, warn, Instrument};
use tripdesk_common::cache::{CacheStats, TtlCache};
use tripdesk_domain::{
    ApiResult, ErrorCode, FormPart, FormValue, HttpMethod, NormalizedError, RequestBody,
    RequestSpec, ResponseEnvelope, ResponsePayload, ResponseType, TransportConfig, TripdeskError,
};
use url::Url;
use uuid::Uuid;

use super::interceptors::{ErrorInterceptor, Interceptors, RequestInterceptor, ResponseInterceptor};
use super::options::RequestOptions;
use crate::errors::InfraError;

/// Cache key: method, fully resolved URL and serialized body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    method: HttpMethod,
    url: String,
    body: String,
}

impl CacheKey {
    fn for_spec(spec: &RequestSpec) -> Self {
        Self {
            method: spec.method,
            url: spec.url.clone(),
            body: spec.body.as_ref().map(RequestBody::cache_fragment).unwrap_or_default(),
        }
    }
}

/// Single chokepoint for outbound HTTP calls.
///
/// Every call goes through the request interceptors, an optional response
/// cache for GETs, a timeout-bounded dispatch with exponential-backoff
/// retries, and finally the response or error interceptors. Failures always
/// surface as [`NormalizedError`].
pub struct TransportClient {
    client: ReqwestClient,
    base_url: Option<String>,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    cache_ttl: Duration,
    interceptors: Interceptors,
    cache: TtlCache<CacheKey, ResponseEnvelope>,
}

impl TransportClient {
    /// Start building a new transport client.
    pub fn builder() -> TransportClientBuilder {
        TransportClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TripdeskError> {
        Self::builder().build()
    }

    /// Append a request interceptor; it runs after those already registered.
    pub fn add_request_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.add_request(interceptor);
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.interceptors.add_response(interceptor);
    }

    /// Append an error interceptor. Runs once per failed call, after the last attempt.
    pub fn add_error_interceptor(&self, interceptor: Arc<dyn ErrorInterceptor>) {
        self.interceptors.add_error(interceptor);
    }

    /// Registered interceptor pipeline.
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!(source = "transport", "response cache cleared");
    }

    /// Hit, miss and entry counts of the response cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Resolve `endpoint` against the configured base URL.
    pub fn resolve(&self, endpoint: &str) -> String {
        join_url(self.base_url.as_deref(), endpoint)
    }

    /// Issue a request, filling unset options from the client defaults.
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<ResponseEnvelope> {
        let ttl = options.cache_ttl.unwrap_or(self.cache_ttl);
        let spec = RequestSpec {
            method,
            url: self.resolve(endpoint),
            headers: options.headers,
            body: options.body,
            timeout: options.timeout.unwrap_or(self.timeout),
            retries: options.retries.unwrap_or(self.retries),
            retry_delay: options.retry_delay.unwrap_or(self.retry_delay),
            cache: options.cache.unwrap_or(false),
            skip_auth: options.skip_auth,
            response_type: options.response_type.unwrap_or_default(),
        };
        self.dispatch(spec, ttl).await
    }

    /// Issue a fully specified request. Cached responses use the default TTL.
    pub async fn execute(&self, spec: RequestSpec) -> ApiResult<ResponseEnvelope> {
        self.dispatch(spec, self.cache_ttl).await
    }

    /// GET `endpoint`.
    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Get, endpoint, options).await
    }

    /// POST `endpoint`.
    pub async fn post(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Post, endpoint, options).await
    }

    /// PUT `endpoint`.
    pub async fn put(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Put, endpoint, options).await
    }

    /// PATCH `endpoint`.
    pub async fn patch(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Patch, endpoint, options).await
    }

    /// DELETE `endpoint`.
    pub async fn delete(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Delete, endpoint, options).await
    }

    /// POST a multipart form. The form is rebuilt for every attempt.
    pub async fn upload(
        &self,
        endpoint: &str,
        parts: Vec<FormPart>,
        options: RequestOptions,
    ) -> ApiResult<ResponseEnvelope> {
        self.request(HttpMethod::Post, endpoint, options.body(RequestBody::Multipart(parts))).await
    }

    async fn dispatch(&self, spec: RequestSpec, ttl: Duration) -> ApiResult<ResponseEnvelope> {
        let span = debug_span!(
            "transport_request",
            request_id = %Uuid::new_v4(),
            method = %spec.method,
            url = %spec.url,
        );
        self.dispatch_inner(spec, ttl).instrument(span).await
    }

    async fn dispatch_inner(&self, spec: RequestSpec, ttl: Duration) -> ApiResult<ResponseEnvelope> {
        let spec = self.interceptors.apply_request(spec);

        let cache_key = spec.is_cacheable().then(|| CacheKey::for_spec(&spec));
        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get(key) {
                debug!(source = "transport", "serving response from cache");
                return Ok(cached);
            }
        }

        let attempts = spec.retries.saturating_add(1);
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            debug!(source = "transport", attempt, "sending HTTP request");

            match self.send_once(&spec).await {
                Ok(response) => break Ok(response),
                Err(err) if attempt < attempts => {
                    let delay = backoff_delay(spec.retry_delay, attempt);
                    debug!(
                        source = "transport",
                        attempt,
                        status = err.status,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "request failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => break Err(err),
            }
        };

        match outcome {
            Ok(response) => {
                let response = self.interceptors.apply_response(response);
                if let Some(key) = cache_key {
                    self.cache.insert(key, response.clone(), ttl);
                }
                debug!(source = "transport", status = response.status, "request succeeded");
                Ok(response)
            }
            Err(err) => {
                warn!(
                    source = "transport",
                    attempts = attempt,
                    status = err.status,
                    code = err.code.as_ref().map(|code| code.as_str()).unwrap_or("-"),
                    error = %err.message,
                    "request failed"
                );
                Err(self.interceptors.apply_error(err))
            }
        }
    }

    async fn send_once(&self, spec: &RequestSpec) -> ApiResult<ResponseEnvelope> {
        let request = self.build_request(spec).map_err(|err| NormalizedError::from(InfraError::from(err)))?;

        let exchange = async {
            let response = self.client.execute(request).await?;
            let status = response.status();
            let headers = collect_headers(response.headers());
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, headers, body) = match tokio::time::timeout(spec.timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(err)) => return Err(InfraError::from(err).into()),
            Err(_) => {
                return Err(NormalizedError::timeout(format!(
                    "Request timed out after {}ms",
                    spec.timeout.as_millis()
                )))
            }
        };

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        Ok(ResponseEnvelope {
            data: decode_payload(spec.response_type, status, &body)?,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
        })
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<reqwest::Request, reqwest::Error> {
        let mut builder = self.client.request(to_reqwest_method(spec.method), &spec.url);
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }

        builder = match &spec.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => {
                if !spec.headers.keys().any(|name| name.eq_ignore_ascii_case("content-type")) {
                    builder = builder.header(CONTENT_TYPE, "text/plain; charset=utf-8");
                }
                builder.body(text.clone())
            }
            Some(RequestBody::Multipart(parts)) => builder.multipart(build_form(parts)?),
        };

        builder.build()
    }
}

/// Builder for [`TransportClient`].
#[derive(Debug)]
pub struct TransportClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    cache_ttl: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for TransportClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            retries: 0,
            retry_delay: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(300),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl TransportClientBuilder {
    /// Apply the timeout, retry and cache defaults from configuration.
    pub fn config(self, config: &TransportConfig) -> Self {
        self.timeout(Duration::from_millis(config.timeout_ms))
            .retries(config.retries)
            .retry_delay(Duration::from_millis(config.retry_delay_ms))
            .cache_ttl(Duration::from_secs(config.cache_ttl_secs))
    }

    /// Base URL that relative endpoints are joined onto.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the number of retries after the first attempt.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay of the exponential backoff.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Default lifetime of cached GET responses.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// `User-Agent` sent with every request.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers sent with every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<TransportClient, TripdeskError> {
        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| TripdeskError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(TransportClient {
            client,
            base_url: self.base_url,
            timeout: self.timeout,
            retries: self.retries,
            retry_delay: self.retry_delay,
            cache_ttl: self.cache_ttl,
            interceptors: Interceptors::default(),
            cache: TtlCache::new(),
        })
    }
}

/// Join `endpoint` onto `base`, collapsing the slash at the seam.
///
/// Absolute `http(s)` endpoints are returned as-is.
pub fn join_url(base: Option<&str>, endpoint: &str) -> String {
    let is_absolute = Url::parse(endpoint)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false);

    match base {
        Some(base) if !is_absolute => {
            let endpoint = endpoint.trim_start_matches('/');
            let base = base.trim_end_matches('/');
            if endpoint.is_empty() {
                base.to_string()
            } else {
                format!("{base}/{endpoint}")
            }
        }
        _ => endpoint.to_string(),
    }
}

/// Delay before retry number `retry_number` (1-based): `base * 2^(n-1)`.
fn backoff_delay(base: Duration, retry_number: u32) -> Duration {
    let shift = retry_number.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for part in parts {
        form = match &part.value {
            FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
            FormValue::File { file_name, mime, bytes } => {
                let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime)?;
                }
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn decode_payload(
    response_type: ResponseType,
    status: StatusCode,
    body: &[u8],
) -> ApiResult<ResponsePayload> {
    match response_type {
        ResponseType::Binary => Ok(ResponsePayload::Binary(body.to_vec())),
        _ if body.is_empty() => Ok(ResponsePayload::Empty),
        ResponseType::Text => Ok(ResponsePayload::Text(String::from_utf8_lossy(body).into_owned())),
        ResponseType::Json => serde_json::from_slice(body).map(ResponsePayload::Json).map_err(|err| {
            NormalizedError::unknown(format!("Failed to decode response body: {err}"), status.as_u16())
        }),
    }
}

/// Normalize a non-2xx response, copying message and code from a JSON body.
fn error_from_response(status: StatusCode, body: &[u8]) -> NormalizedError {
    let status = status.as_u16();
    let fallback = format!("Request failed with status {status}");

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => {
            let message = fields
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| fields.get("error").and_then(Value::as_str))
                .map_or(fallback, str::to_string);
            let code = fields.get("code").and_then(Value::as_str).map(ErrorCode::parse);

            let error = NormalizedError::new(message, status).with_details(Value::Object(fields));
            match code {
                Some(code) => error.with_code(code),
                None => error,
            }
        }
        Ok(other) => NormalizedError::new(fallback, status).with_details(other),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let error = NormalizedError::new(fallback, status);
            if text.trim().is_empty() {
                error
            } else {
                error.with_details(Value::String(text.into_owned()))
            }
        }
    }
}
