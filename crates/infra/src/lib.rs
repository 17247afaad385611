//! # Tripdesk Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The HTTP transport client (interceptors, response cache, retries)
//! - Per-service clients and the HTTP auth backend
//! - Credential stores (in-memory and JSON file)
//! - Configuration loading and tracing bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `tripdesk-core`
//! - Depends on `tripdesk-domain`, `tripdesk-common` and `tripdesk-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod navigation;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use api::{AuthApi, ServiceClient, ServiceClients};
pub use errors::InfraError;
pub use http::{
    AuthHeaderInterceptor, RequestOptions, TransportClient, TransportClientBuilder,
    UnauthorizedInterceptor,
};
pub use navigation::RecordingNavigator;
pub use observability::init_tracing;
pub use storage::{FileCredentialStore, MemoryCredentialStore};
