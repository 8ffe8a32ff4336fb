//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: login, OTP verification, logout and password reset
//! - `SessionHandle`: shared read access to the token plus forced logout
//! - `SessionStore`: persisted session entries (file, keychain, memory)
//!
//! Tokens are treated as valid for eight hours after issue unless configured otherwise.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod store;
pub mod validation;

pub use credentials::KeyringSessionStore;
pub use error::{AuthError, ErrorCategory};
pub use manager::{LoginStatus, SessionHandle, SessionManager};
pub use session::{
    AuthStatus, Feedback, Session, SessionData, SessionSnapshot, SessionState,
    DEFAULT_SESSION_TTL_HOURS,
};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError, StoredSession};
pub use validation::ValidationError;
