//! SQLite implementation of `NoteRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{OrchestratorResult, PersistenceError};
use crate::domain::models::Note;
use crate::domain::ports::NoteRepository;

#[derive(Clone)]
pub struct SqliteNoteRepository {
    pool: SqlitePool,
}

impl SqliteNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: String,
    topic_id: String,
    title: String,
    content: String,
    note_type: Option<String>,
    created_at: String,
}

impl TryFrom<NoteRow> for Note {
    type Error = PersistenceError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            topic_id: Uuid::parse_str(&row.topic_id).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            title: row.title,
            content: row.content,
            note_type: row.note_type,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
        })
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn insert(&self, note: &Note) -> OrchestratorResult<()> {
        sqlx::query(
            "INSERT INTO notes (id, topic_id, title, content, note_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(note.id.to_string())
        .bind(note.topic_id.to_string())
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.note_type)
        .bind(note.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn get(&self, note_id: Uuid) -> OrchestratorResult<Option<Note>> {
        let row: Option<NoteRow> = sqlx::query_as("SELECT * FROM notes WHERE id = ?")
            .bind(note_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        row.map(Note::try_from).transpose().map_err(Into::into)
    }

    async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<Note>> {
        let rows: Vec<NoteRow> = sqlx::query_as("SELECT * FROM notes WHERE topic_id = ? ORDER BY created_at DESC")
            .bind(topic_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        rows.into_iter().map(Note::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;
    use crate::adapters::sqlite::migrations::Migrator;

    #[tokio::test]
    async fn insert_then_list_for_topic() {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone()).run_embedded_migrations().await.unwrap();
        let topic_id = Uuid::new_v4();
        sqlx::query("INSERT INTO topics (id, title, created_at, updated_at) VALUES (?, 't', datetime('now'), datetime('now'))")
            .bind(topic_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteNoteRepository::new(pool);
        let note = Note::from_synthesis(topic_id, "query", "# Title\nbody".to_string(), None);
        repo.insert(&note).await.unwrap();

        let notes = repo.list_for_topic(topic_id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Title");
    }
}
