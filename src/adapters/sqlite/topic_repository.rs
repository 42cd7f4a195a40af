//! SQLite implementation of `TopicRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{OrchestratorResult, PersistenceError};
use crate::domain::models::Topic;
use crate::domain::ports::TopicRepository;

#[derive(Clone)]
pub struct SqliteTopicRepository {
    pool: SqlitePool,
}

impl SqliteTopicRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: String,
    title: String,
    description: Option<String>,
    active_strategy_version: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TopicRow> for Topic {
    type Error = PersistenceError;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            active_strategy_version: row.active_strategy_version,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, PersistenceError> {
    Uuid::parse_str(s).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))
}

#[async_trait]
impl TopicRepository for SqliteTopicRepository {
    async fn create(&self, topic: &Topic) -> OrchestratorResult<()> {
        sqlx::query(
            "INSERT INTO topics (id, title, description, active_strategy_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(topic.id.to_string())
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(topic.active_strategy_version)
        .bind(topic.created_at.to_rfc3339())
        .bind(topic.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn get(&self, topic_id: Uuid) -> OrchestratorResult<Option<Topic>> {
        let row: Option<TopicRow> = sqlx::query_as("SELECT * FROM topics WHERE id = ?")
            .bind(topic_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        row.map(Topic::try_from).transpose().map_err(Into::into)
    }

    async fn list(&self) -> OrchestratorResult<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as("SELECT * FROM topics ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        rows.into_iter().map(Topic::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn set_active_strategy_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
        sqlx::query("UPDATE topics SET active_strategy_version = ?, updated_at = ? WHERE id = ?")
            .bind(version)
            .bind(Utc::now().to_rfc3339())
            .bind(topic_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;
    use crate::adapters::sqlite::migrations::Migrator;

    async fn setup() -> SqlitePool {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone()).run_embedded_migrations().await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let pool = setup().await;
        let repo = SqliteTopicRepository::new(pool);
        let topic = Topic::new("quantum annealing".to_string(), None);
        repo.create(&topic).await.unwrap();

        let fetched = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "quantum annealing");
        assert!(fetched.active_strategy_version.is_none());
    }

    #[tokio::test]
    async fn set_active_strategy_version_persists() {
        let pool = setup().await;
        let repo = SqliteTopicRepository::new(pool);
        let topic = Topic::new("t".to_string(), Some("d".to_string()));
        repo.create(&topic).await.unwrap();

        repo.set_active_strategy_version(topic.id, 2).await.unwrap();
        let fetched = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(fetched.active_strategy_version, Some(2));
    }
}
