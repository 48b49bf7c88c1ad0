//! Settings store contract and implementations.
//!
//! Persisted configuration (extra map pools, default session options) is a
//! plain key-value contract. The file-backed store keeps a TOML table at an
//! env-overridable path; a missing file just means defaults.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::StoreError;

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// In-memory store for tests and simulations.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// TOML-file-backed store. Values are kept as a flat table; TOML cannot
/// represent nulls, so callers store concrete values only.
pub struct TomlFileStore {
    path: PathBuf,
    table: Mutex<toml::Table>,
}

impl TomlFileStore {
    /// Opens the store at the default path (`TENMAN_STORE_PATH` override,
    /// else `.tenman/store.toml` under the working directory).
    pub fn open() -> Self {
        Self::open_at(store_path())
    }

    pub fn open_at(path: PathBuf) -> Self {
        let table = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| toml::from_str(&contents).ok())
            .unwrap_or_default();
        Self {
            path,
            table: Mutex::new(table),
        }
    }

    fn persist(&self, table: &toml::Table) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(table).unwrap_or_default();
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SettingsStore for TomlFileStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let table = self.table.lock();
        let value = table.get(key)?;
        serde_json::to_value(value).ok()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let toml_value = toml::Value::try_from(&value)
            .map_err(|err| StoreError::Encode(key.to_string(), err.to_string()))?;
        let mut table = self.table.lock();
        table.insert(key.to_string(), toml_value);
        self.persist(&table)
    }
}

fn store_path() -> PathBuf {
    if let Ok(path) = std::env::var("TENMAN_STORE_PATH") {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".tenman")
        .join("store.toml")
}
