//! hrdesk core - session lifecycle and API client for the HR management backend.
//!
//! The [`auth::SessionManager`] owns the login session (password, optional
//! one-time code, expiry, logout, password reset) and persists it through a
//! [`auth::SessionStore`]. Requests behind login go through
//! [`api::PortalClient`], which attaches the current bearer token and ends the
//! session when the server rejects it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

use std::sync::Arc;

use anyhow::Result;

use api::{ApiClient, PortalClient};
use auth::SessionManager;
use config::Config;

/// Build a session manager and an authorized client sharing one session.
///
/// The persisted session is not read yet; call
/// [`SessionManager::check_auth`] before relying on it.
pub fn connect(config: &Config) -> Result<(SessionManager, PortalClient)> {
    let api = ApiClient::from_config(config)?;
    let store = config.open_session_store()?;
    let manager = SessionManager::new(Arc::new(api.clone()), store).with_ttl(config.session_ttl());
    let portal = PortalClient::new(api, manager.handle());
    Ok((manager, portal))
}
