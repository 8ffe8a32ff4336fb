//! Session lifecycle against the authentication API.
//!
//! `SessionManager` is the single owner of the session: it performs the
//! login / OTP / logout / password-reset calls and is the only writer of the
//! persisted record. Other components (the authorized client, front ends)
//! get a [`SessionHandle`] to read the current token and to force a logout
//! when the server rejects it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use super::error::{AuthError, ErrorCategory};
use super::session::{
    parse_expiration, AuthStatus, Feedback, Session, SessionData, SessionSnapshot,
    DEFAULT_SESSION_TTL_HOURS,
};
use super::store::{SessionStore, StoreError, StoredSession};
use super::validation;
use crate::api::schema::{LoginOutcome, ResetPasswordRequest};
use crate::api::{ApiError, AuthApi};

const INVALID_CREDENTIALS_MESSAGE: &str = "Incorrect username or password";
const INVALID_OTP_MESSAGE: &str = "Invalid or expired OTP";
const INVALID_RESET_CODE_MESSAGE: &str = "Invalid or expired reset code";

/// Result of a successful password step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Authenticated,
    OtpRequired,
}

struct Shared {
    session: Session,
    store: Box<dyn SessionStore>,
    feedback: Feedback,
}

impl Shared {
    /// Persist first, then switch the in-memory state
    fn establish(&mut self, data: SessionData) -> Result<(), StoreError> {
        if let Err(e) = self.store.write_session(&data) {
            if let Err(cleanup) = self.store.clear_session() {
                warn!(error = %cleanup, "Failed to clean up partially written session");
            }
            self.session.clear();
            return Err(e);
        }
        self.session.authenticate(data);
        Ok(())
    }

    /// Clear memory unconditionally, then storage
    fn terminate(&mut self) -> Result<(), StoreError> {
        self.session.clear();
        self.store.clear_session()
    }
}

/// Shared access to the session owned by a [`SessionManager`].
/// Clone is cheap; all clones see the same session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Shared>>,
}

impl SessionHandle {
    fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared {
                session: Session::new(),
                store,
                feedback: Feedback::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let shared = self.lock();
        SessionSnapshot::capture(&shared.session, &shared.feedback, now)
    }

    pub fn status(&self) -> AuthStatus {
        self.lock().session.status_at(Utc::now())
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn feedback(&self) -> Feedback {
        self.lock().feedback.clone()
    }

    /// Token for the next authorized request.
    ///
    /// An expired session is ended here, so callers never send a token the
    /// client already knows to be stale.
    pub fn current_token(&self) -> Result<String, AuthError> {
        self.current_token_at(Utc::now())
    }

    pub fn current_token_at(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut shared = self.lock();
        match shared.session.data() {
            Some(data) if !data.is_expired_at(now) => return Ok(data.token.clone()),
            Some(_) => {}
            None => return Err(AuthError::NotAuthenticated),
        }

        info!("Session expired, logging out");
        if let Err(e) = shared.terminate() {
            error!(error = %e, "Failed to clear expired session from storage");
        }
        shared.feedback = Feedback {
            error: Some(AuthError::SessionExpired.user_message()),
            message: None,
        };
        Err(AuthError::SessionExpired)
    }

    /// Forced logout after the server rejected `token`.
    ///
    /// Only acts while `token` is still the active one, so any number of
    /// rejections for the same token end the session exactly once. Returns
    /// whether the session was ended by this call.
    pub fn invalidate(&self, token: &str) -> bool {
        let mut shared = self.lock();
        let is_current = shared.session.data().map(|d| d.token == token).unwrap_or(false);
        if !is_current {
            debug!("Ignoring rejection for a token that is no longer active");
            return false;
        }

        warn!("Server rejected the session token, logging out");
        if let Err(e) = shared.terminate() {
            error!(error = %e, "Failed to clear rejected session from storage");
        }
        shared.feedback = Feedback {
            error: Some(AuthError::Unauthorized.user_message()),
            message: None,
        };
        true
    }

    fn begin(&self) {
        self.lock().feedback = Feedback::default();
    }

    fn record_error(&self, err: &AuthError) {
        self.lock().feedback.error = Some(err.user_message());
    }

    fn record_message(&self, message: impl Into<String>) {
        self.lock().feedback.message = Some(message.into());
    }
}

/// Map a rejection from an authentication endpoint to a credential error,
/// keeping the server's wording when it sent any.
fn credential_error(err: ApiError, fallback: &str, make: fn(String) -> AuthError) -> AuthError {
    match err {
        ApiError::BadRequest(_)
        | ApiError::Unauthorized(_)
        | ApiError::AccessDenied(_)
        | ApiError::NotFound(_) => {
            let message = err
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string());
            make(message)
        }
        other => AuthError::Api(other),
    }
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    handle: SessionHandle,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: Box<dyn SessionStore>) -> Self {
        Self {
            api,
            handle: SessionHandle::new(store),
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }

    /// Lifetime given to newly issued tokens
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.handle.is_authenticated()
    }

    /// Record the failure for display and hand it back to the caller
    fn fail(&self, err: AuthError) -> AuthError {
        match err.category() {
            ErrorCategory::Validation | ErrorCategory::Credential => {
                debug!(error = %err, "Authentication request rejected")
            }
            _ => warn!(error = %err, "Authentication request failed"),
        }
        self.handle.record_error(&err);
        err
    }

    fn establish(&self, token: String, identifier: &str) -> Result<(), AuthError> {
        let data = SessionData::issue(token, Some(identifier.to_string()), Utc::now(), self.ttl);
        let result = self.handle.lock().establish(data);
        result.map_err(|e| self.fail(e.into()))
    }

    /// Send credentials. Depending on the server this either authenticates
    /// right away or leaves the session waiting for a one-time code.
    ///
    /// A rejected login leaves any existing session and stored token alone.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginStatus, AuthError> {
        let identifier = identifier.trim();
        self.handle.begin();
        validation::validate_credentials(identifier, password).map_err(|e| self.fail(e.into()))?;

        let outcome = self
            .api
            .login(identifier, password)
            .await
            .map_err(|e| self.fail(credential_error(e, INVALID_CREDENTIALS_MESSAGE, AuthError::InvalidCredentials)))?;

        match outcome {
            LoginOutcome::Token(token) => {
                self.establish(token.access_token, identifier)?;
                info!(username = identifier, "Login successful");
                Ok(LoginStatus::Authenticated)
            }
            LoginOutcome::OtpRequired { message } => {
                let mut shared = self.handle.lock();
                // A new sign-in replaces whatever session was active before
                if let Err(e) = shared.terminate() {
                    warn!(error = %e, "Failed to clear previous session");
                }
                shared.session.begin_otp(identifier.to_string());
                shared.feedback.message = Some(message);
                info!(username = identifier, "Password accepted, waiting for OTP");
                Ok(LoginStatus::OtpRequired)
            }
        }
    }

    /// Exchange a one-time code for a token and start the session
    pub async fn verify_otp(&self, identifier: &str, otp_code: &str) -> Result<(), AuthError> {
        let identifier = identifier.trim();
        let otp_code = otp_code.trim();
        self.handle.begin();
        validation::validate_otp(identifier, otp_code).map_err(|e| self.fail(e.into()))?;

        let token = self
            .api
            .verify_otp(identifier, otp_code)
            .await
            .map_err(|e| self.fail(credential_error(e, INVALID_OTP_MESSAGE, AuthError::InvalidOtp)))?;

        self.establish(token.access_token, identifier)?;
        info!(username = identifier, "OTP verified, session started");
        Ok(())
    }

    /// Restore the persisted session on startup.
    ///
    /// Returns true when a valid token was restored. Anything else (no token,
    /// missing or unparsable expiry, expired token) clears the session and
    /// storage, so repeated calls settle on the same state.
    pub fn check_auth(&self) -> Result<bool, AuthError> {
        self.check_auth_at(Utc::now())
    }

    pub fn check_auth_at(&self, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let mut shared = self.handle.lock();
        let stored = match shared.store.read_session() {
            Ok(stored) => stored,
            Err(StoreError::Corrupt(e)) => {
                warn!(error = %e, "Discarding unreadable session record");
                StoredSession::default()
            }
            Err(e) => {
                shared.session.clear();
                drop(shared);
                return Err(self.fail(e.into()));
            }
        };

        let expires_at = stored.expiration.as_deref().and_then(parse_expiration);
        let restored = match (stored.token, expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() && now < expires_at => {
                Some(SessionData {
                    token,
                    username: stored.username,
                    expires_at,
                })
            }
            (Some(_), _) => {
                info!("Stored session is expired or incomplete, clearing it");
                None
            }
            (None, _) => None,
        };

        match restored {
            Some(data) => {
                debug!(expires_at = %data.expires_at, "Restored session from storage");
                shared.session.authenticate(data);
                Ok(true)
            }
            None => {
                let result = shared.terminate();
                drop(shared);
                result.map_err(|e| self.fail(e.into()))?;
                Ok(false)
            }
        }
    }

    /// End the session. The server is told best-effort; local state and
    /// storage are cleared whether or not it answers.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.handle.begin();
        let token = self.handle.lock().session.data().map(|d| d.token.clone());

        if let Some(token) = token {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        let result = self.handle.lock().terminate();
        result.map_err(|e| self.fail(e.into()))?;
        self.handle.record_message("Logged out");
        info!("Logged out");
        Ok(())
    }

    /// Ask the server to email a password reset code. Returns the server's message.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        self.handle.begin();
        if email.is_empty() {
            return Err(self.fail(validation::ValidationError::MissingField("Email").into()));
        }

        let response = self
            .api
            .forgot_password(email)
            .await
            .map_err(|e| self.fail(e.into()))?;

        info!(email, "Password reset code requested");
        self.handle.record_message(response.message.clone());
        Ok(response.message)
    }

    /// Set a new password using a reset code. Returns the server's message.
    pub async fn reset_password(
        &self,
        email: &str,
        otp_code: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError> {
        let email = email.trim();
        let otp_code = otp_code.trim();
        self.handle.begin();
        validation::validate_reset(email, otp_code, new_password, confirm_password)
            .map_err(|e| self.fail(e.into()))?;

        let request = ResetPasswordRequest {
            email,
            otp_code,
            new_password,
            confirm_password,
        };
        let response = self.api.reset_password(&request).await.map_err(|e| {
            let err = match e {
                ApiError::BadRequest(_) | ApiError::NotFound(_) => {
                    credential_error(e, INVALID_RESET_CODE_MESSAGE, AuthError::InvalidOtp)
                }
                other => AuthError::Api(other),
            };
            self.fail(err)
        })?;

        info!(email, "Password reset");
        self.handle.record_message(response.message.clone());
        Ok(response.message)
    }
}
