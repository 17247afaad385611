//! Application context - dependency injection container
//!
//! Everything process-wide is built here, once, from a [`Config`] and the
//! two host-provided ports (credential persistence and navigation). Nothing
//! in the workspace reaches for a global.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tripdesk_core::ports::{AuthBackend, CredentialStore, Navigator};
use tripdesk_core::{SessionConfig, SessionManager};
use tripdesk_domain::{Config, Result};
use tripdesk_infra::http::{AuthHeaderInterceptor, UnauthorizedInterceptor};
use tripdesk_infra::{config, AuthApi, ServiceClients, TransportClient};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub transport: Arc<TransportClient>,
    pub services: ServiceClients,
    pub session: SessionManager,
    pub store: Arc<dyn CredentialStore>,
    pub navigator: Arc<dyn Navigator>,
}

impl AppContext {
    /// Create a context from configuration found in the environment or on
    /// disk.
    ///
    /// # Errors
    /// Returns `TripdeskError::Config` if no usable configuration exists.
    pub fn from_env(
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        Self::new(config::load()?, store, navigator)
    }

    /// Create a context with explicit configuration.
    ///
    /// Registers the bearer-token and 401 interceptors on the shared
    /// transport before any service can issue a request.
    ///
    /// # Errors
    /// Returns `TripdeskError::Config` if the HTTP client cannot be built.
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let transport = Arc::new(
            TransportClient::builder()
                .config(&config.transport)
                .user_agent(concat!("tripdesk/", env!("CARGO_PKG_VERSION")))
                .build()?,
        );
        transport.add_request_interceptor(Arc::new(AuthHeaderInterceptor::new(Arc::clone(&store))));
        transport.add_error_interceptor(Arc::new(UnauthorizedInterceptor::new(
            Arc::clone(&store),
            Arc::clone(&navigator),
        )));

        let services = ServiceClients::new(&config.api, Arc::clone(&transport));
        let backend: Arc<dyn AuthBackend> = Arc::new(AuthApi::new(services.auth.clone()));

        let session = SessionManager::new(
            backend,
            Arc::clone(&store),
            Arc::clone(&navigator),
            session_config(&config),
        );

        info!(
            auth_url = %config.api.auth_url,
            timeout_ms = config.transport.timeout_ms,
            retries = config.transport.retries,
            bypass = config.auth_bypass.enabled,
            "application context initialized"
        );

        Ok(Self { config, transport, services, session, store, navigator })
    }

    /// Stop background work. Pending requests are left to finish on their
    /// own.
    pub fn shutdown(&self) {
        self.session.shutdown();
        self.transport.clear_cache();
        info!("application context shut down");
    }
}

fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        bypass: config.auth_bypass.clone(),
        ..SessionConfig::default()
    }
}
