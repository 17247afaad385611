//! Configuration structures

use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by the transport and session layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub auth_bypass: AuthBypassConfig,
}

/// Base URLs of the backend microservices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub auth_url: String,
    pub user_url: String,
    pub trip_url: String,
    pub journal_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:8081/api".to_string(),
            user_url: "http://localhost:8082/api".to_string(),
            trip_url: "http://localhost:8083/api".to_string(),
            journal_url: "http://localhost:8084/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

/// Development-only switch that lets a login proceed without the backend.
///
/// Off unless explicitly enabled. Tokens it produces are unsigned and carry a
/// `bypass` claim so they can never be mistaken for backend-issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBypassConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_email: Option<String>,
    #[serde(default = "default_bypass_role")]
    pub default_role: String,
}

fn default_bypass_role() -> String {
    "admin".to_string()
}

impl Default for AuthBypassConfig {
    fn default() -> Self {
        Self { enabled: false, allowed_email: None, default_role: default_bypass_role() }
    }
}

impl AuthBypassConfig {
    /// Whether a login for `email` may use the bypass path.
    #[must_use]
    pub fn permits(&self, email: &str) -> bool {
        self.enabled
            && self
                .allowed_email
                .as_deref()
                .map_or(true, |allowed| allowed.eq_ignore_ascii_case(email))
    }
}
