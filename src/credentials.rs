// src/credentials.rs
// Plaintext username/password store.
//
// Placeholder only: passwords are stored and compared as-is. A real deployment
// delegates identity to an external provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const USERS_KEY: &str = "users";
const CURRENT_USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String key-value storage, the shape of a browser's local storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Whole store kept as one JSON object on disk, rewritten on every change
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
}

pub struct CredentialStore<S> {
    store: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        match self.store.get(USERS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Add a user; false if the name is taken or empty. Existing records are never updated.
    pub fn register(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        if username.is_empty() {
            return Ok(false);
        }

        let mut users = self.users()?;
        if users.iter().any(|u| u.username == username) {
            tracing::debug!("Register refused, user exists: {}", username);
            return Ok(false);
        }

        users.push(UserRecord {
            username: username.to_string(),
            password: password.to_string(),
        });
        self.store.set(USERS_KEY, serde_json::to_string(&users)?)?;
        tracing::info!("Registered user {}", username);
        Ok(true)
    }

    /// Exact match on both fields; on success the user becomes current
    pub fn login(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let found = self
            .users()?
            .into_iter()
            .find(|u| u.username == username && u.password == password);

        match found {
            Some(user) => {
                self.store.set(CURRENT_USER_KEY, serde_json::to_string(&user)?)?;
                tracing::info!("User {} logged in", username);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.remove(CURRENT_USER_KEY)
    }

    pub fn current_user(&self) -> Result<Option<String>, StoreError> {
        match self.store.get(CURRENT_USER_KEY)? {
            Some(raw) => {
                let user: UserRecord = serde_json::from_str(&raw)?;
                Ok(Some(user.username))
            }
            None => Ok(None),
        }
    }

    #[cfg(test)]
    fn stored_password(&self, username: &str) -> Option<String> {
        self.users()
            .ok()?
            .into_iter()
            .find(|u| u.username == username)
            .map(|u| u.password)
    }
}
