//! Error types used throughout the application
//!
//! [`NormalizedError`] is the only failure shape that leaves the transport
//! layer. [`TripdeskError`] covers everything that never touches the wire
//! (configuration, credential storage, local validation).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Machine-readable classification attached to a [`NormalizedError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request was cancelled by its timeout signal.
    Timeout,
    /// DNS, connection or other transport-level failure.
    NetworkError,
    /// Anything the transport could not classify.
    UnknownError,
    /// Code supplied by the backend in its error body.
    Backend(String),
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::Backend(code) => code,
        }
    }

    /// Parse a wire code, mapping the reserved names back onto their variants.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "TIMEOUT" => Self::Timeout,
            "NETWORK_ERROR" => Self::NetworkError,
            "UNKNOWN_ERROR" => Self::UnknownError,
            other => Self::Backend(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// The single error shape surfaced by the transport client.
///
/// `status` is `0` for failures that never produced an HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} (status {status})")]
pub struct NormalizedError {
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl NormalizedError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self { message: message.into(), status, code: None, details: None }
    }

    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Request cancelled by its timeout signal (status 408).
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message, 408).with_code(ErrorCode::Timeout)
    }

    /// Connection-level failure (status 0).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, 0).with_code(ErrorCode::NetworkError)
    }

    pub fn unknown(message: impl Into<String>, status: u16) -> Self {
        Self::new(message, status).with_code(ErrorCode::UnknownError)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code == Some(ErrorCode::Timeout)
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.code == Some(ErrorCode::NetworkError)
    }
}

/// Main error type for failures that do not cross the transport boundary
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TripdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for non-transport operations
pub type Result<T> = std::result::Result<T, TripdeskError>;

/// Result of anything that goes over the wire
pub type ApiResult<T> = std::result::Result<T, NormalizedError>;
