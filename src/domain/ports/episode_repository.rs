use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::Episode;

/// Persistence port for `Episode` records. Episodes are append-only once
/// terminal (spec §3); the repository does not enforce that here, the
/// episode runtime does, since only it knows the current in-flight state.
#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    async fn insert(&self, episode: &Episode) -> OrchestratorResult<()>;

    async fn update(&self, episode: &Episode) -> OrchestratorResult<()>;

    async fn get(&self, episode_id: Uuid) -> OrchestratorResult<Option<Episode>>;

    /// Most recent episodes for a topic, newest first, used both for
    /// operator inspection and as the window the evolution analyzer
    /// aggregates over.
    async fn recent_for_topic(&self, topic_id: Uuid, limit: u32) -> OrchestratorResult<Vec<Episode>>;

    async fn count_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<u64>;
}
