pub mod kv;
pub mod models;
pub mod store;

pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StoreError};
pub use models::{next_record_id, HistoryRecord};
pub use store::HistoryStore;
