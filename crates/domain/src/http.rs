//! Request and response shapes handled by the transport client.
//!
//! These are plain data. A [`RequestSpec`] is assembled per call, passed
//! through the request interceptors, and treated as immutable once
//! dispatched. A [`ResponseEnvelope`] is produced once per completed request
//! and handed to the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorCode, NormalizedError};
use crate::impl_domain_status_conversions;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Binary,
}

impl_domain_status_conversions!(ResponseType {
    Json => "json",
    Text => "text",
    Binary => "binary",
});

/// One field of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File { file_name: String, mime: Option<String>, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: FormValue::Text(value.into()) }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File { file_name: file_name.into(), mime, bytes },
        }
    }
}

/// Request payload.
///
/// Multipart bodies are kept as owned parts so the form can be rebuilt for
/// every retry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    /// Serialized form used as the body component of a cache key.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Multipart(_) => String::new(),
        }
    }
}

/// Fully resolved description of one outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub cache: bool,
    pub skip_auth: bool,
    pub response_type: ResponseType,
}

impl RequestSpec {
    /// Spec with the transport defaults: 30s timeout, no retries, no cache.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: Duration::from_secs(30),
            retries: 0,
            retry_delay: Duration::from_millis(1000),
            cache: false,
            skip_auth: false,
            response_type: ResponseType::Json,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether the response to this request may be served from cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cache && self.method == HttpMethod::Get
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
    Empty,
}

impl ResponsePayload {
    /// View the payload as JSON; text bodies are parsed, everything else is
    /// `null`.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => serde_json::from_str(text)
                .unwrap_or_else(|_| serde_json::Value::String(text.clone())),
            Self::Binary(_) | Self::Empty => serde_json::Value::Null,
        }
    }
}

/// Completed response handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub data: ResponsePayload,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        match self.data {
            ResponsePayload::Json(value) => value,
            other => other.to_value(),
        }
    }

    /// Deserialize the payload into a typed value.
    ///
    /// # Errors
    /// Returns an `UNKNOWN_ERROR` carrying the response status when the
    /// payload does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, NormalizedError> {
        serde_json::from_value(self.data.to_value()).map_err(|err| {
            NormalizedError::new(format!("Failed to decode response: {err}"), self.status)
                .with_code(ErrorCode::UnknownError)
        })
    }
}
