//! Key-value persistence for timers and patient data
//!
//! A synchronous, best-effort device store. Callers treat every failure as
//! recoverable: writes are logged and dropped, reads fall back to defaults.

use std::{
    collections::HashMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::state::Timer;

/// Storage key for the timer collection; bump the suffix on schema changes
pub const TIMERS_KEY: &str = "relaxant_timers_v2";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Raw string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read a JSON value, falling back to `fallback` on absence or any failure
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, fallback: T) -> T {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unreadable value under {}: {}", key, e);
                fallback
            }
        },
        Ok(None) => fallback,
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            fallback
        }
    }
}

/// Write a JSON value; failures are logged, never returned
pub fn set_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StoreError::from)
        .and_then(|raw| store.set(key, &raw));
    if let Err(e) = result {
        warn!("Failed to persist {}: {}", key, e);
    }
}

/// In-memory store, used by tests and when no data directory is usable
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!("File store opened at {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // write-then-rename so a crash never leaves a truncated record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Timer collection persistence on top of a key-value store
pub struct TimerStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TimerStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: TIMERS_KEY.to_string(),
        }
    }

    /// Persist the collection, most recent first; failures are swallowed
    pub fn save(&self, timers: &[Timer]) {
        set_json(self.store.as_ref(), &self.key, timers);
    }

    /// Load the collection; absent or corrupt data yields an empty list
    ///
    /// Records that no longer parse are dropped one by one, and every kept
    /// record has its target clamped again.
    pub fn load(&self) -> Vec<Timer> {
        let records: Vec<serde_json::Value> = get_json(self.store.as_ref(), &self.key, Vec::new());
        records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Timer>(record) {
                Ok(timer) => Some(timer.sanitized()),
                Err(e) => {
                    warn!("Dropping unreadable timer record under {}: {}", self.key, e);
                    None
                }
            })
            .collect()
    }
}
