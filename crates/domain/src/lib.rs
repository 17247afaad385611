//! # Tripdesk Domain
//!
//! Data types shared by every layer of the console's client-to-service
//! communication stack.
//!
//! This crate contains:
//! - Transport request/response shapes and the normalized error
//! - Session and auth endpoint types
//! - Resource synchronization state
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other Tripdesk crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod http;
pub mod macros;
pub mod resource;
pub mod session;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use http::*;
pub use resource::*;
pub use session::*;
