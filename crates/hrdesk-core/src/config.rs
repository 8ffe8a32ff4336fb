//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, which portal to act as, session lifetime
//! and where the session token is kept.
//!
//! Configuration is stored at `~/.config/hrdesk/config.json`. A handful of
//! environment variables override the file for one-off runs.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileSessionStore, KeyringSessionStore, SessionStore, DEFAULT_SESSION_TTL_HOURS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "hrdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "HRDESK_API_URL";
pub const ENV_PORTAL: &str = "HRDESK_PORTAL";
pub const ENV_USERNAME: &str = "HRDESK_USERNAME";

/// Which front end the client is acting as. Only the login and logout paths differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    /// HR management console, two-factor login
    Admin,
    /// Employee self-service portal
    #[default]
    Employee,
}

impl Portal {
    pub fn login_path(&self) -> &'static str {
        match self {
            Portal::Admin => "login/admin",
            Portal::Employee => "login",
        }
    }

    pub fn logout_path(&self) -> &'static str {
        match self {
            Portal::Admin => "logout/admin",
            Portal::Employee => "logout/me",
        }
    }
}

impl FromStr for Portal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "hr" => Ok(Portal::Admin),
            "employee" | "user" => Ok(Portal::Employee),
            other => Err(anyhow::anyhow!("Unknown portal '{}' (expected admin or employee)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `session.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub portal: Portal,
    pub session_ttl_hours: i64,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
    /// Directory for rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            portal: Portal::default(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_username: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides on top of the loaded file
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(portal) = lookup(ENV_PORTAL).filter(|v| !v.trim().is_empty()) {
            self.portal = portal.parse()?;
        }
        if let Some(username) = lookup(ENV_USERNAME).filter(|v| !v.trim().is_empty()) {
            self.last_username = Some(username);
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the configured session store. Sessions are scoped per portal so
    /// an admin and an employee login can coexist on one machine.
    pub fn open_session_store(&self) -> Result<Box<dyn SessionStore>> {
        let profile = match self.portal {
            Portal::Admin => "admin",
            Portal::Employee => "employee",
        };
        match self.token_storage {
            TokenStorage::File => {
                let dir = self.cache_dir()?.join(profile);
                Ok(Box::new(FileSessionStore::new(dir)))
            }
            TokenStorage::Keyring => Ok(Box::new(KeyringSessionStore::new(profile))),
        }
    }
}
