//! Wire schemas for the authentication endpoints.
//!
//! Every payload is parsed into one of these types at the boundary so a
//! response with missing or mistyped fields fails as
//! [`ApiError::MalformedResponse`] instead of leaking half-filled values.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::ApiError;

/// Parse a JSON body, naming the payload in the error
pub fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse(format!("{}: {}", what, e)))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Reject tokens we could not send back as a bearer credential
    pub fn validate(self) -> Result<Self, ApiError> {
        if self.access_token.trim().is_empty() {
            return Err(ApiError::MalformedResponse("empty access_token".to_string()));
        }
        if let Some(ref kind) = self.token_type {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(ApiError::MalformedResponse(format!(
                    "unsupported token_type '{}'",
                    kind
                )));
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginResponse {
    Token(TokenResponse),
    Challenge(MessageResponse),
}

/// What the server asked for after accepting a password
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Single-factor login: the token is issued right away
    Token(TokenResponse),
    /// Two-factor login: a code was sent out of band
    OtpRequired { message: String },
}

impl LoginOutcome {
    pub fn parse(body: &str) -> Result<Self, ApiError> {
        match parse_json::<LoginResponse>(body, "login response")? {
            LoginResponse::Token(token) => Ok(LoginOutcome::Token(token.validate()?)),
            LoginResponse::Challenge(challenge) => Ok(LoginOutcome::OtpRequired {
                message: challenge.message,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CredentialsForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct VerifyOtpQuery<'a> {
    pub username: &'a str,
    pub otp_code: &'a str,
}

/// The reset routes identify the account by email, not username
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ForgotPasswordQuery<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    pub otp_code: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChangePasswordQuery<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Extract the human-readable message from an error body.
///
/// Accepts `{"message": ".."}` and FastAPI style `{"detail": ".."}` or
/// `{"detail": [{"msg": ".."}, ..]}`.
pub fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    if let Some(message) = parsed.message.filter(|m| !m.trim().is_empty()) {
        return Some(message);
    }
    match parsed.detail? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}
