//! Auth service endpoints behind the [`AuthBackend`] port

use async_trait::async_trait;
use tracing::instrument;
use tripdesk_core::ports::AuthBackend;
use tripdesk_domain::{
    ApiPayload, ApiResult, HttpMethod, LoginPayload, LoginRequest, RefreshPayload,
    RefreshRequest, ResponsePayload, ValidationPayload,
};

use super::client::{encode_body, ServiceClient};
use crate::http::RequestOptions;

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const VALIDATE_ENDPOINT: &str = "/auth/validate";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";

/// HTTP implementation of [`AuthBackend`] on top of the auth service client.
///
/// Login and refresh are sent without the bearer header; validate and logout
/// carry whatever token the auth interceptor finds in the store.
#[derive(Debug, Clone)]
pub struct AuthApi {
    service: ServiceClient,
}

impl AuthApi {
    pub fn new(service: ServiceClient) -> Self {
        Self { service }
    }
}

#[async_trait]
impl AuthBackend for AuthApi {
    #[instrument(skip_all, fields(source = "service:auth"))]
    async fn login(&self, email: &str, password: &str) -> ApiResult<LoginPayload> {
        let body = encode_body(&LoginRequest { email, password })?;
        let response = self
            .service
            .request(HttpMethod::Post, LOGIN_ENDPOINT, RequestOptions::new().json(body).skip_auth())
            .await?;
        Ok(response.json::<ApiPayload<LoginPayload>>()?.into_inner())
    }

    async fn validate(&self) -> ApiResult<ValidationPayload> {
        let response = self.service.get(VALIDATE_ENDPOINT).await?;
        match &response.data {
            ResponsePayload::Empty | ResponsePayload::Json(serde_json::Value::Null) => {
                Ok(ValidationPayload::default())
            }
            _ => response.json(),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<RefreshPayload> {
        let body = encode_body(&RefreshRequest { refresh_token })?;
        let response = self
            .service
            .request(HttpMethod::Post, REFRESH_ENDPOINT, RequestOptions::new().json(body).skip_auth())
            .await?;
        Ok(response.json::<ApiPayload<RefreshPayload>>()?.into_inner())
    }

    async fn logout(&self) -> ApiResult<()> {
        self.service.request(HttpMethod::Post, LOGOUT_ENDPOINT, RequestOptions::new()).await?;
        Ok(())
    }
}
