//! REST API client module for the HR management backend.
//!
//! `ApiClient` makes the unauthenticated authentication calls. Everything
//! behind login goes through `PortalClient`, which attaches the bearer token
//! of the current session to each request and ends the session when the
//! server answers 401.

pub mod client;
pub mod error;
pub mod portal;
pub mod schema;

pub use client::{ApiClient, AuthApi};
pub use error::ApiError;
pub use portal::PortalClient;
