use serde::{Deserialize, Serialize};

/// One completed generation and the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub generated_image: String,
    pub original_image: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub outfit: String,
}

/// Picks an id from the clock that stays above every existing id.
pub fn next_record_id(now_millis: i64, history: &[HistoryRecord]) -> i64 {
    let newest = history.iter().map(|record| record.id).max();
    match newest {
        Some(newest) if now_millis <= newest => newest.saturating_add(1),
        _ => now_millis,
    }
}
