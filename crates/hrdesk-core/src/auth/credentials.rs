use keyring::Entry;
use tracing::debug;

use super::store::{SessionStore, StoreError};

const SERVICE_NAME: &str = "hrdesk";

/// Keeps session entries in the OS keychain instead of a plain file.
/// Each key becomes one credential under the `hrdesk` service, scoped by profile.
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    profile: String,
}

impl KeyringSessionStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(SERVICE_NAME, &format!("{}:{}", self.profile, key))?)
    }
}

impl SessionStore for KeyringSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        debug!(key, "Stored session entry in keychain");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
