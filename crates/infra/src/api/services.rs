use std::sync::Arc;

use tripdesk_domain::ApiConfig;

use super::client::ServiceClient;
use crate::http::TransportClient;

/// One [`ServiceClient`] per backend, all sharing a single transport.
#[derive(Debug, Clone)]
pub struct ServiceClients {
    pub auth: ServiceClient,
    pub user: ServiceClient,
    pub trip: ServiceClient,
    pub journal: ServiceClient,
}

impl ServiceClients {
    pub fn new(config: &ApiConfig, transport: Arc<TransportClient>) -> Self {
        Self {
            auth: ServiceClient::new("auth", &config.auth_url, Arc::clone(&transport)),
            user: ServiceClient::new("user", &config.user_url, Arc::clone(&transport)),
            trip: ServiceClient::new("trip", &config.trip_url, Arc::clone(&transport)),
            journal: ServiceClient::new("journal", &config.journal_url, transport),
        }
    }
}
