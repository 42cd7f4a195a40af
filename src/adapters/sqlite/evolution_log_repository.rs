//! SQLite implementation of `EvolutionLogRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{OrchestratorResult, PersistenceError};
use crate::domain::models::EvolutionLogEntry;
use crate::domain::ports::EvolutionLogRepository;

#[derive(Clone)]
pub struct SqliteEvolutionLogRepository {
    pool: SqlitePool,
}

impl SqliteEvolutionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EvolutionLogRow {
    id: String,
    topic_id: String,
    from_version: Option<i64>,
    to_version: i64,
    reason: String,
    changes: String,
    created_at: String,
}

impl TryFrom<EvolutionLogRow> for EvolutionLogEntry {
    type Error = PersistenceError;

    fn try_from(row: EvolutionLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            topic_id: Uuid::parse_str(&row.topic_id).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            from_version: row.from_version,
            to_version: row.to_version,
            reason: row.reason,
            changes: serde_json::from_str(&row.changes)?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
        })
    }
}

#[async_trait]
impl EvolutionLogRepository for SqliteEvolutionLogRepository {
    async fn insert(&self, entry: &EvolutionLogEntry) -> OrchestratorResult<()> {
        let changes_json = serde_json::to_string(&entry.changes).map_err(PersistenceError::from)?;
        sqlx::query(
            "INSERT INTO evolution_log (id, topic_id, from_version, to_version, reason, changes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.topic_id.to_string())
        .bind(entry.from_version)
        .bind(entry.to_version)
        .bind(&entry.reason)
        .bind(changes_json)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<EvolutionLogEntry>> {
        let rows: Vec<EvolutionLogRow> =
            sqlx::query_as("SELECT * FROM evolution_log WHERE topic_id = ? ORDER BY created_at ASC")
                .bind(topic_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(PersistenceError::QueryFailed)?;
        rows.into_iter().map(EvolutionLogEntry::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn exists_for_version(&self, topic_id: Uuid, to_version: i64) -> OrchestratorResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM evolution_log WHERE topic_id = ? AND to_version = ?")
                .bind(topic_id.to_string())
                .bind(to_version)
                .fetch_one(&self.pool)
                .await
                .map_err(PersistenceError::QueryFailed)?;
        Ok(row.0 > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;
    use crate::adapters::sqlite::migrations::Migrator;
    use serde_json::json;

    #[tokio::test]
    async fn exists_for_version_reflects_inserted_entries() {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone()).run_embedded_migrations().await.unwrap();
        let topic_id = Uuid::new_v4();
        sqlx::query("INSERT INTO topics (id, title, created_at, updated_at) VALUES (?, 't', datetime('now'), datetime('now'))")
            .bind(topic_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteEvolutionLogRepository::new(pool);
        assert!(!repo.exists_for_version(topic_id, 2).await.unwrap());

        let entry = EvolutionLogEntry::new(topic_id, Some(1), 2, "low save rate".to_string(), json!({}));
        repo.insert(&entry).await.unwrap();

        assert!(repo.exists_for_version(topic_id, 2).await.unwrap());
        assert_eq!(repo.list_for_topic(topic_id).await.unwrap().len(), 1);
    }
}
