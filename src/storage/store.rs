//! Sectioned key-value store contract and an in-memory implementation.
use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, PoisonError},
};

use toml::{Table, Value};

/// Failures raised by a key-value store backend.
#[derive(Debug, Clone)]
pub enum StoreError {
    Io { file: String, message: String },
    Parse { file: String, message: String },
    Serialize { file: String, message: String },
}

impl StoreError {
    pub fn io(file: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Io {
            file: file.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(file: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }

    pub fn serialize(file: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Serialize {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { file, message } => write!(f, "unable to access {}: {}", file, message),
            Self::Parse { file, message } => write!(f, "invalid contents in {}: {}", file, message),
            Self::Serialize { file, message } => {
                write!(f, "unable to serialise {}: {}", file, message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Contract for the configuration collaborator. Each `file` is an independent
/// section holding string-keyed TOML values.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, file: &str, key: &str, value: Value) -> Result<(), StoreError>;

    fn remove(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Full snapshot of a section. Missing sections are empty.
    fn table(&self, file: &str) -> Result<Table, StoreError>;

    fn keys(&self, file: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.table(file)?.keys().cloned().collect())
    }

    /// Writes `value` only when `key` is absent.
    fn set_default(&self, file: &str, key: &str, value: Value) -> Result<(), StoreError> {
        if self.get(file, key)?.is_none() {
            self.set(file, key, value)?;
        }
        Ok(())
    }
}

/// Volatile store keeping every section in memory.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, Table>>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a section from TOML source text.
    pub fn with_document(self, file: &str, source: &str) -> Result<Self, StoreError> {
        let table: Table = toml::from_str(source).map_err(|err| StoreError::parse(file, err))?;
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.to_string(), table);
        Ok(self)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(file).and_then(|table| table.get(key)).cloned())
    }

    fn set(&self, file: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files
            .entry(file.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get_mut(file).and_then(|table| table.remove(key)))
    }

    fn table(&self, file: &str) -> Result<Table, StoreError> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(file).cloned().unwrap_or_default())
    }
}
