//! HTTP transport: interceptors, response cache, timeouts and retries

pub mod client;
pub mod interceptors;
pub mod options;

pub use client::{join_url, TransportClient, TransportClientBuilder};
pub use interceptors::{
    AuthHeaderInterceptor, ErrorInterceptor, Interceptors, RequestInterceptor,
    ResponseInterceptor, UnauthorizedInterceptor,
};
pub use options::RequestOptions;
