use thiserror::Error;

use super::store::StoreError;
use super::validation::ValidationError;
use crate::api::ApiError;

/// Shown for connectivity problems; the details go to the log
const GENERIC_NETWORK_MESSAGE: &str = "An error occurred. Please try again.";

const SESSION_ENDED_MESSAGE: &str = "Your session has expired. Please log in again.";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid OTP: {0}")]
    InvalidOtp(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session was rejected by the server")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Broad class of a failure, deciding how it is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wrong password, bad code, or a request the server refused
    Credential,
    /// The server could not be reached or failed
    Network,
    /// Caught locally before any request was sent
    Validation,
    /// The session ended and the user must log in again
    Session,
    Internal,
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::InvalidCredentials(_) | AuthError::InvalidOtp(_) => ErrorCategory::Credential,
            AuthError::NotAuthenticated | AuthError::SessionExpired | AuthError::Unauthorized => {
                ErrorCategory::Session
            }
            AuthError::Validation(_) => ErrorCategory::Validation,
            AuthError::Api(ApiError::Unauthorized(_)) => ErrorCategory::Session,
            AuthError::Api(e) if e.is_connectivity() => ErrorCategory::Network,
            AuthError::Api(ApiError::MalformedResponse(_)) | AuthError::Api(ApiError::InvalidResponse(_)) => {
                ErrorCategory::Internal
            }
            AuthError::Api(_) => ErrorCategory::Credential,
            AuthError::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Text suitable for showing inline next to a form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials(m) | AuthError::InvalidOtp(m) => m.clone(),
            AuthError::NotAuthenticated => "Please log in first.".to_string(),
            AuthError::SessionExpired | AuthError::Unauthorized => SESSION_ENDED_MESSAGE.to_string(),
            AuthError::Validation(e) => e.to_string(),
            AuthError::Api(ApiError::Unauthorized(_)) => SESSION_ENDED_MESSAGE.to_string(),
            AuthError::Api(e) if e.is_connectivity() => GENERIC_NETWORK_MESSAGE.to_string(),
            AuthError::Api(e) => match e.server_message() {
                Some(m) => m.to_string(),
                None => GENERIC_NETWORK_MESSAGE.to_string(),
            },
            AuthError::Storage(e) => format!("Could not save session: {}", e),
        }
    }

    /// Whether this failure ended the local session
    pub fn ends_session(&self) -> bool {
        matches!(self, AuthError::SessionExpired | AuthError::Unauthorized)
    }
}
