use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::Topic;

/// Persistence port for `Topic` aggregates.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    async fn create(&self, topic: &Topic) -> OrchestratorResult<()>;

    async fn get(&self, topic_id: Uuid) -> OrchestratorResult<Option<Topic>>;

    async fn list(&self) -> OrchestratorResult<Vec<Topic>>;

    /// Updates the topic's `active_strategy_version` pointer. Called by the
    /// strategy store after `promote` so reads of the topic reflect the
    /// current active version without a join.
    async fn set_active_strategy_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()>;
}
