//! # Tripdesk Core
//!
//! Orchestration for the console's client-to-service layer, free of
//! transport and storage details.
//!
//! This crate contains:
//! - Port interfaces (traits) for credential storage, navigation and the
//!   auth service
//! - The resource synchronization controller views build on
//! - The session lifecycle manager and its expiry watchdog
//!
//! ## Architecture Principles
//! - Only depends on `tripdesk-domain` and `tripdesk-common`
//! - No HTTP or filesystem code
//! - All external dependencies via traits

pub mod ports;
pub mod resource;
pub mod session;

pub use ports::{AuthBackend, CredentialStore, Navigator};
pub use resource::{
    FetchOutcome, MutationWithRefetch, Resource, ResourceBuilder, ResourceOptions,
};
pub use session::{ExpiryCheck, SessionConfig, SessionManager};
