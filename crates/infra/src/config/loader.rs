//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the process environment when one exists
//! 2. Attempts to load from environment variables
//! 3. If a required variable is missing, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `TRIPDESK_AUTH_API_URL`: Auth service base URL
//! - `TRIPDESK_USER_API_URL`: User service base URL
//! - `TRIPDESK_TRIP_API_URL`: Trip service base URL
//! - `TRIPDESK_JOURNAL_API_URL`: Journal service base URL
//!
//! Optional:
//! - `TRIPDESK_REQUEST_TIMEOUT_MS`: Default request timeout
//! - `TRIPDESK_CACHE_TTL_SECS`: Default response cache TTL
//! - `TRIPDESK_LOG_LEVEL`: Log verbosity (`RUST_LOG` still wins)
//! - `TRIPDESK_LOG_JSON`: Emit JSON log lines (true/false)
//! - `TRIPDESK_AUTH_BYPASS`: Enable the development login bypass
//! - `TRIPDESK_AUTH_BYPASS_EMAIL`: Only this email may use the bypass
//! - `TRIPDESK_AUTH_BYPASS_ROLE`: Role granted to bypass sessions
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./tripdesk.json` or `./tripdesk.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tripdesk_domain::{
    ApiConfig, AuthBypassConfig, Config, LogConfig, Result, TransportConfig, TripdeskError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `TripdeskError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Could not load .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The four service URLs must be present; everything else falls back to
/// its default.
///
/// # Errors
/// Returns `TripdeskError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let api = ApiConfig {
        auth_url: env_var("TRIPDESK_AUTH_API_URL")?,
        user_url: env_var("TRIPDESK_USER_API_URL")?,
        trip_url: env_var("TRIPDESK_TRIP_API_URL")?,
        journal_url: env_var("TRIPDESK_JOURNAL_API_URL")?,
    };

    let defaults = TransportConfig::default();
    let transport = TransportConfig {
        timeout_ms: env_parse("TRIPDESK_REQUEST_TIMEOUT_MS", defaults.timeout_ms)?,
        cache_ttl_secs: env_parse("TRIPDESK_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
        ..defaults
    };

    let log_defaults = LogConfig::default();
    let log = LogConfig {
        level: std::env::var("TRIPDESK_LOG_LEVEL").unwrap_or(log_defaults.level),
        json: env_bool("TRIPDESK_LOG_JSON", log_defaults.json),
    };

    let bypass_defaults = AuthBypassConfig::default();
    let auth_bypass = AuthBypassConfig {
        enabled: env_bool("TRIPDESK_AUTH_BYPASS", false),
        allowed_email: std::env::var("TRIPDESK_AUTH_BYPASS_EMAIL").ok().filter(|s| !s.is_empty()),
        default_role: std::env::var("TRIPDESK_AUTH_BYPASS_ROLE")
            .unwrap_or(bypass_defaults.default_role),
    };

    Ok(Config { api, transport, log, auth_bypass })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TripdeskError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TripdeskError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TripdeskError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TripdeskError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TripdeskError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TripdeskError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TripdeskError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Returns the first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_paths(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_paths(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_paths(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("tripdesk.json"),
        dir.join("tripdesk.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TripdeskError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable, using `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| TripdeskError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
