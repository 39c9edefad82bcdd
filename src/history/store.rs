use tracing::{debug, warn};

use super::kv::{KeyValueStore, StoreError};
use super::models::HistoryRecord;

/// Best-effort persistence of the history list in a single key-value slot.
///
/// Neither `load` nor `save` report failures to the caller: a damaged or
/// unwritable store is logged and the in-memory list stays authoritative.
pub struct HistoryStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl HistoryStore {
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    pub fn load(&self) -> Vec<HistoryRecord> {
        match self.try_load() {
            Ok(records) => {
                debug!("Loaded {} history record(s) from '{}'", records.len(), self.key);
                records
            }
            Err(err) => {
                warn!("Failed to load history from '{}': {}", self.key, err);
                Vec::new()
            }
        }
    }

    pub fn save(&mut self, records: &[HistoryRecord]) {
        if let Err(err) = self.try_save(records) {
            warn!(
                "Failed to save {} history record(s) to '{}': {}",
                records.len(),
                self.key,
                err
            );
        }
    }

    fn try_load(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn try_save(&mut self, records: &[HistoryRecord]) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(records)?;
        self.backend.set(&self.key, &serialized)
    }
}
