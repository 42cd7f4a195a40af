//! EvolutionLogEntry: the audit record of a strategy mutation produced by the
//! evolution analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Record of a strategy mutation (spec §3). `changes` is a structured diff of
/// the config fields the analyzer altered, not the full before/after config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionLogEntry {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub from_version: Option<i64>,
    pub to_version: i64,
    pub reason: String,
    pub changes: Value,
    pub created_at: DateTime<Utc>,
}

impl EvolutionLogEntry {
    pub fn new(topic_id: Uuid, from_version: Option<i64>, to_version: i64, reason: String, changes: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_id,
            from_version,
            to_version,
            reason,
            changes,
            created_at: Utc::now(),
        }
    }
}
