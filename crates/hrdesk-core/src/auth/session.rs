use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of an issued token in hours.
/// The admin console treats every token as valid for eight hours after issue.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 8;

/// Minutes before expiry at which a session is reported as ending soon
const EXPIRY_WARNING_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub username: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    /// Build session data for a freshly issued token
    pub fn issue(token: String, username: Option<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token,
            username,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the session will expire within the warning window
    pub fn expires_soon(&self) -> bool {
        Utc::now() + Duration::minutes(EXPIRY_WARNING_MINUTES) >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    /// Expiry as milliseconds since the Unix epoch, the persisted representation
    pub fn expiration_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }
}

/// Parse a persisted expiration value (milliseconds since the epoch).
pub fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// Credentials were accepted and the server is waiting for a one-time code
    PendingOtp { identifier: String },
    Authenticated(SessionData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum AuthStatus {
    Unauthenticated,
    PendingOtp,
    Authenticated,
}

/// Client-side record of the authentication state.
///
/// `authenticated` is never stored; it is derived from the token's expiry so a
/// session can only report itself authenticated while its token is still valid.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> AuthStatus {
        match &self.state {
            SessionState::Unauthenticated => AuthStatus::Unauthenticated,
            SessionState::PendingOtp { .. } => AuthStatus::PendingOtp,
            SessionState::Authenticated(data) if data.is_expired_at(now) => {
                AuthStatus::Unauthenticated
            }
            SessionState::Authenticated(_) => AuthStatus::Authenticated,
        }
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == AuthStatus::Authenticated
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// Session data regardless of expiry
    pub fn data(&self) -> Option<&SessionData> {
        match &self.state {
            SessionState::Authenticated(data) => Some(data),
            _ => None,
        }
    }

    /// Get the bearer token if the session is valid at `now`
    pub fn token_at(&self, now: DateTime<Utc>) -> Option<&str> {
        self.data()
            .filter(|d| !d.is_expired_at(now))
            .map(|d| d.token.as_str())
    }

    pub fn pending_identifier(&self) -> Option<&str> {
        match &self.state {
            SessionState::PendingOtp { identifier } => Some(identifier),
            _ => None,
        }
    }

    pub(crate) fn begin_otp(&mut self, identifier: String) {
        self.state = SessionState::PendingOtp { identifier };
    }

    pub(crate) fn authenticate(&mut self, data: SessionData) {
        self.state = SessionState::Authenticated(data);
    }

    /// Reset to unauthenticated. Returns true if there was anything to clear.
    pub(crate) fn clear(&mut self) -> bool {
        let changed = self.state != SessionState::Unauthenticated;
        self.state = SessionState::Unauthenticated;
        changed
    }
}

/// Outcome of the last operation, shaped for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Feedback {
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Read-only view of a session for front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub authenticated: bool,
    pub username: Option<String>,
    pub pending_identifier: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub minutes_until_expiry: Option<i64>,
    #[serde(flatten)]
    pub feedback: Feedback,
}

impl SessionSnapshot {
    pub fn capture(session: &Session, feedback: &Feedback, now: DateTime<Utc>) -> Self {
        let status = session.status_at(now);
        let live = session.data().filter(|d| !d.is_expired_at(now));
        Self {
            status,
            authenticated: status == AuthStatus::Authenticated,
            username: live.and_then(|d| d.username.clone()),
            pending_identifier: session.pending_identifier().map(str::to_string),
            expires_at: live.map(|d| d.expires_at),
            minutes_until_expiry: live.map(|d| (d.expires_at - now).num_minutes().max(0)),
            feedback: feedback.clone(),
        }
    }
}
