use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::EvolutionLogEntry;

/// Persistence port for `EvolutionLogEntry` records.
#[async_trait]
pub trait EvolutionLogRepository: Send + Sync {
    async fn insert(&self, entry: &EvolutionLogEntry) -> OrchestratorResult<()>;

    async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<EvolutionLogEntry>>;

    /// Whether an entry with `to_version` already exists for the topic, used
    /// to keep `EvolutionAnalyzer::on_episode_completed` idempotent against
    /// re-runs (spec §8, "re-running the analyzer on the same episode is a
    /// no-op").
    async fn exists_for_version(&self, topic_id: Uuid, to_version: i64) -> OrchestratorResult<bool>;
}
