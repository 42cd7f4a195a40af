//! SQLite implementation of `StrategyRepository`. `promote` is the one
//! multi-statement write, wrapped in `BEGIN IMMEDIATE` to serialize
//! concurrent mutations per topic (spec §4.1, §5 "Strategy Store is the only
//! writer to strategies; it serializes mutations per topic under a
//! transaction").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{OrchestratorResult, PersistenceError};
use crate::domain::models::{Strategy, StrategyConfig, StrategyStatus};
use crate::domain::ports::StrategyRepository;

#[derive(Clone)]
pub struct SqliteStrategyRepository {
    pool: SqlitePool,
}

impl SqliteStrategyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StrategyRow {
    topic_id: String,
    version: i64,
    status: String,
    rollout_percentage: i64,
    parent_version: Option<i64>,
    config: String,
    created_at: String,
}

impl TryFrom<StrategyRow> for Strategy {
    type Error = PersistenceError;

    fn try_from(row: StrategyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            topic_id: Uuid::parse_str(&row.topic_id).map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            version: row.version,
            status: row
                .status
                .parse::<StrategyStatus>()
                .map_err(PersistenceError::ConnectionFailed)?,
            rollout_percentage: u8::try_from(row.rollout_percentage)
                .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
            parent_version: row.parent_version,
            config: serde_json::from_str::<StrategyConfig>(&row.config)?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?,
        })
    }
}

#[async_trait]
impl StrategyRepository for SqliteStrategyRepository {
    async fn insert(&self, strategy: &Strategy) -> OrchestratorResult<()> {
        let config_json = serde_json::to_string(&strategy.config).map_err(PersistenceError::from)?;
        sqlx::query(
            "INSERT INTO strategies (topic_id, version, status, rollout_percentage, parent_version, config, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(strategy.topic_id.to_string())
        .bind(strategy.version)
        .bind(strategy.status.to_string())
        .bind(i64::from(strategy.rollout_percentage))
        .bind(strategy.parent_version)
        .bind(config_json)
        .bind(strategy.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn get_active(&self, topic_id: Uuid) -> OrchestratorResult<Option<Strategy>> {
        let row: Option<StrategyRow> =
            sqlx::query_as("SELECT * FROM strategies WHERE topic_id = ? AND status = 'active'")
                .bind(topic_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(PersistenceError::QueryFailed)?;
        row.map(Strategy::try_from).transpose().map_err(Into::into)
    }

    async fn get_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<Option<Strategy>> {
        let row: Option<StrategyRow> = sqlx::query_as("SELECT * FROM strategies WHERE topic_id = ? AND version = ?")
            .bind(topic_id.to_string())
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        row.map(Strategy::try_from).transpose().map_err(Into::into)
    }

    async fn list_versions(&self, topic_id: Uuid) -> OrchestratorResult<Vec<Strategy>> {
        let rows: Vec<StrategyRow> =
            sqlx::query_as("SELECT * FROM strategies WHERE topic_id = ? ORDER BY version ASC")
                .bind(topic_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(PersistenceError::QueryFailed)?;
        rows.into_iter().map(Strategy::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn highest_version(&self, topic_id: Uuid) -> OrchestratorResult<Option<i64>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT MAX(version) FROM strategies WHERE topic_id = ?")
                .bind(topic_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(PersistenceError::QueryFailed)?;
        Ok(row.and_then(|(v,)| v))
    }

    async fn promote(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::QueryFailed)?;

        sqlx::query(
            "UPDATE strategies SET status = 'archived' WHERE topic_id = ? AND status = 'active' AND version != ?",
        )
        .bind(topic_id.to_string())
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::QueryFailed)?;

        sqlx::query(
            "UPDATE strategies SET status = 'active', rollout_percentage = 100 WHERE topic_id = ? AND version = ?",
        )
        .bind(topic_id.to_string())
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::QueryFailed)?;

        tx.commit().await.map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn archive(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
        sqlx::query("UPDATE strategies SET status = 'archived' WHERE topic_id = ? AND version = ?")
            .bind(topic_id.to_string())
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn set_rollout_percentage(&self, topic_id: Uuid, version: i64, percentage: u8) -> OrchestratorResult<()> {
        sqlx::query("UPDATE strategies SET rollout_percentage = ? WHERE topic_id = ? AND version = ?")
            .bind(i64::from(percentage))
            .bind(topic_id.to_string())
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }
}
