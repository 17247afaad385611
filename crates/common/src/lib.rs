//! Shared utilities for the Tripdesk client crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clocks and the TTL response cache
//! - `auth`: bearer token claim inspection
//! - `test-utils`: mock clock re-exports for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod cache;
#[cfg(feature = "foundation")]
pub mod time;

// Auth tier
// -------------------------------------------------------------------
#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "foundation")]
pub use cache::{CacheStats, TtlCache};
#[cfg(feature = "foundation")]
pub use time::{Clock, SystemClock};
#[cfg(any(feature = "test-utils", test))]
pub use time::MockClock;
