use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::Strategy;

/// Persistence port underlying the strategy store service (spec §4.1). This
/// trait is deliberately low-level (plain CRUD + the one atomic promote); the
/// weighted `selectForQuery` draw and candidate-rollout-budget bookkeeping
/// live in `services::strategy_store`, not here.
#[async_trait]
pub trait StrategyRepository: Send + Sync {
    async fn insert(&self, strategy: &Strategy) -> OrchestratorResult<()>;

    async fn get_active(&self, topic_id: Uuid) -> OrchestratorResult<Option<Strategy>>;

    async fn get_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<Option<Strategy>>;

    async fn list_versions(&self, topic_id: Uuid) -> OrchestratorResult<Vec<Strategy>>;

    async fn highest_version(&self, topic_id: Uuid) -> OrchestratorResult<Option<i64>>;

    /// Atomically promotes `version` to active and demotes the previously
    /// active version (if any) to archived, inside a single transaction.
    async fn promote(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()>;

    async fn archive(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()>;

    async fn set_rollout_percentage(&self, topic_id: Uuid, version: i64, percentage: u8) -> OrchestratorResult<()>;
}
