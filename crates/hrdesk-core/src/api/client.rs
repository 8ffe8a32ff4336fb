//! API client for the HR management REST API.
//!
//! `ApiClient` owns the connection pool and knows the endpoint layout. It
//! carries no session state: the unauthenticated authentication calls live
//! here, and protected requests go through [`super::PortalClient`], which
//! reads the current token per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::schema::{
    self, CredentialsForm, ForgotPasswordQuery, LoginOutcome, MessageResponse, ResetPasswordRequest,
    TokenResponse, VerifyOtpQuery,
};
use super::ApiError;
use crate::config::{Config, Portal, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Verify-OTP endpoint, shared by both portals
const VERIFY_OTP_PATH: &str = "verify-otp";
const FORGOT_PASSWORD_PATH: &str = "forgot-password";
const RESET_PASSWORD_PATH: &str = "reset-password";

/// Calls the session manager makes against the authentication API.
///
/// Implemented by [`ApiClient`]; tests substitute scripted backends.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, ApiError>;

    async fn verify_otp(&self, identifier: &str, otp_code: &str) -> Result<TokenResponse, ApiError>;

    /// Tell the server the token is no longer in use
    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    /// Ask for a reset code, sent to the account's email address
    async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError>;

    async fn reset_password(&self, request: &ResetPasswordRequest<'_>) -> Result<MessageResponse, ApiError>;
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    portal: Portal,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, portal: Portal) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, portal, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        portal: Portal,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            portal,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(&config.base_url, config.portal, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn portal(&self) -> Portal {
        self.portal
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        schema::parse_json(&text, what)
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let url = self.endpoint(self.portal.login_path());
        debug!(url = %url, username = identifier, "Sending login request");

        let response = self
            .client
            .post(&url)
            .form(&CredentialsForm {
                username: identifier,
                password,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        LoginOutcome::parse(&text)
    }

    async fn verify_otp(&self, identifier: &str, otp_code: &str) -> Result<TokenResponse, ApiError> {
        let url = self.endpoint(VERIFY_OTP_PATH);
        debug!(url = %url, username = identifier, "Sending OTP verification");

        let response = self
            .client
            .post(&url)
            .query(&VerifyOtpQuery {
                username: identifier,
                otp_code,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = Self::read_json(response, "verify-otp response").await?;
        token.validate()
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = self.endpoint(self.portal.logout_path());
        debug!(url = %url, "Sending logout request");

        let response = self.client.post(&url).bearer_auth(token).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let url = self.endpoint(FORGOT_PASSWORD_PATH);
        debug!(url = %url, email, "Requesting password reset code");

        let response = self
            .client
            .post(&url)
            .query(&ForgotPasswordQuery { email })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::read_json(response, "forgot-password response").await
    }

    async fn reset_password(&self, request: &ResetPasswordRequest<'_>) -> Result<MessageResponse, ApiError> {
        let url = self.endpoint(RESET_PASSWORD_PATH);
        debug!(url = %url, email = request.email, "Submitting password reset");

        let response = self.client.post(&url).query(request).send().await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, "reset-password response").await
    }
}
