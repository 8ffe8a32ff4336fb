//! Persisted session storage.
//!
//! A session survives restarts as a handful of string entries under fixed
//! keys. Backends only need to provide get/set/remove; reading and writing a
//! whole session record is built on top of those.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use super::session::SessionData;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the token expiry in milliseconds since the Unix epoch
pub const EXPIRATION_KEY: &str = "tokenExpiration";

/// Key holding the username the token was issued to
pub const USERNAME_KEY: &str = "username";

const ALL_KEYS: [&str; 3] = [TOKEN_KEY, EXPIRATION_KEY, USERNAME_KEY];

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Raw persisted entries, before any validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub token: Option<String>,
    pub expiration: Option<String>,
    pub username: Option<String>,
}

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn read_session(&self) -> Result<StoredSession, StoreError> {
        Ok(StoredSession {
            token: self.get(TOKEN_KEY)?,
            expiration: self.get(EXPIRATION_KEY)?,
            username: self.get(USERNAME_KEY)?,
        })
    }

    fn write_session(&self, data: &SessionData) -> Result<(), StoreError> {
        self.set(TOKEN_KEY, &data.token)?;
        self.set(EXPIRATION_KEY, &data.expiration_millis().to_string())?;
        match data.username {
            Some(ref username) => self.set(USERNAME_KEY, username),
            None => self.remove(USERNAME_KEY),
        }
    }

    /// Remove every session key, attempting all of them even if one fails
    fn clear_session(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(e) = self.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// File store
// ============================================================================

/// Stores session entries as a JSON object in `session.json`.
/// The file is deleted once it holds no entries.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
                debug!(path = %self.path.display(), "Session file removed");
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = match self.load() {
            Ok(entries) => entries,
            // An unreadable file cannot hold a usable session, drop it
            Err(StoreError::Corrupt(_)) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        entries.remove(key);
        self.save(&entries)
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}
