use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::Note;

/// Persistence port for `Note` records.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn insert(&self, note: &Note) -> OrchestratorResult<()>;

    async fn get(&self, note_id: Uuid) -> OrchestratorResult<Option<Note>>;

    async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<Note>>;
}
