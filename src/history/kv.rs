use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage file {0} does not hold a JSON object")]
    NotAnObject(String),
    #[error("storage write rejected: {0}")]
    WriteRejected(String),
}

/// String-keyed slots holding string values, like browser local storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Slots kept as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_object(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let parsed: Value = serde_json::from_str(&raw)?;
        match parsed {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(StoreError::NotAnObject(self.path.display().to_string())),
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(object) = self.read_object()? else {
            return Ok(None);
        };
        Ok(object
            .get(key)
            .and_then(Value::as_str)
            .map(|value| value.to_string()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // Damaged contents are replaced; a failed read is not.
        let mut object = match self.read_object() {
            Ok(object) => object.unwrap_or_default(),
            Err(StoreError::Json(_) | StoreError::NotAnObject(_)) => Map::new(),
            Err(err) => return Err(err),
        };
        object.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let serialized = serde_json::to_string_pretty(&Value::Object(object))?;
        std::fs::write(&self.path, serialized).map_err(|err| self.io_error(err))
    }
}

/// Process-local slots. `fail_writes` simulates a full or read-only store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    slots: HashMap<String, String>,
    pub fail_writes: bool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.slots.insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteRejected("quota exceeded".to_string()));
        }
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
