//! Application constants
//!
//! Persisted-state keys and navigation targets shared by the transport and
//! session layers.

// Persisted state keys
pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";
pub const THEME_ID_KEY: &str = "theme_id";

// Navigation
pub const LOGIN_PATH: &str = "/login";
