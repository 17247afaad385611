//! Service clients for the backend microservices
//!
//! Every service shares one [`TransportClient`](crate::http::TransportClient),
//! so interceptors and the response cache apply uniformly.

pub mod auth;
pub mod client;
pub mod services;

pub use auth::AuthApi;
pub use client::{with_query, ServiceClient};
pub use services::ServiceClients;
