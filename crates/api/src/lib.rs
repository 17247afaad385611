//! # Tripdesk API
//!
//! Application layer - wires the hexagonal architecture together.
//!
//! This crate contains:
//! - Application context (dependency injection)
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Hosts embed [`AppContext`] and supply the credential store and
//!   navigator for their platform

pub mod context;

pub use context::AppContext;
