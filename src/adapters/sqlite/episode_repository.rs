//! SQLite implementation of `EpisodeRepository`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::{OrchestratorResult, PersistenceError};
use crate::domain::models::{Episode, EpisodeStatus, ToolUsage};
use crate::domain::ports::EpisodeRepository;

#[derive(Clone)]
pub struct SqliteEpisodeRepository {
    pool: SqlitePool,
}

impl SqliteEpisodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    id: String,
    topic_id: String,
    user_id: Option<String>,
    strategy_version: i64,
    query: String,
    status: String,
    error_message: Option<String>,
    sources_returned: i64,
    sources_saved: i64,
    tool_usage: String,
    followup_count: i64,
    senso_search_used: i64,
    senso_generate_used: i64,
    result_note_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EpisodeRow> for Episode {
    type Error = PersistenceError;

    fn try_from(row: EpisodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            topic_id: parse_uuid(&row.topic_id)?,
            user_id: row.user_id,
            strategy_version: row.strategy_version,
            query: row.query,
            status: row.status.parse::<EpisodeStatus>().map_err(PersistenceError::ConnectionFailed)?,
            error_message: row.error_message,
            sources_returned: u32::try_from(row.sources_returned).unwrap_or(0),
            sources_saved: u32::try_from(row.sources_saved).unwrap_or(0),
            tool_usage: serde_json::from_str::<HashMap<String, ToolUsage>>(&row.tool_usage)?,
            followup_count: u32::try_from(row.followup_count).unwrap_or(0),
            senso_search_used: row.senso_search_used != 0,
            senso_generate_used: row.senso_generate_used != 0,
            result_note_id: row.result_note_id.as_deref().map(parse_uuid).transpose()?,
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
impl EpisodeRepository for SqliteEpisodeRepository {
    async fn insert(&self, episode: &Episode) -> OrchestratorResult<()> {
        let tool_usage_json = serde_json::to_string(&episode.tool_usage).map_err(PersistenceError::from)?;
        sqlx::query(
            "INSERT INTO episodes (
                id, topic_id, user_id, strategy_version, query, status, error_message,
                sources_returned, sources_saved, tool_usage, followup_count,
                senso_search_used, senso_generate_used, result_note_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(episode.id.to_string())
        .bind(episode.topic_id.to_string())
        .bind(&episode.user_id)
        .bind(episode.strategy_version)
        .bind(&episode.query)
        .bind(episode.status.to_string())
        .bind(&episode.error_message)
        .bind(i64::from(episode.sources_returned))
        .bind(i64::from(episode.sources_saved))
        .bind(tool_usage_json)
        .bind(i64::from(episode.followup_count))
        .bind(i64::from(episode.senso_search_used))
        .bind(i64::from(episode.senso_generate_used))
        .bind(episode.result_note_id.map(|id| id.to_string()))
        .bind(episode.created_at.to_rfc3339())
        .bind(episode.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        Ok(())
    }

    async fn update(&self, episode: &Episode) -> OrchestratorResult<()> {
        let tool_usage_json = serde_json::to_string(&episode.tool_usage).map_err(PersistenceError::from)?;
        let result = sqlx::query(
            "UPDATE episodes SET
                status = ?, error_message = ?, sources_returned = ?, sources_saved = ?,
                tool_usage = ?, followup_count = ?, senso_search_used = ?, senso_generate_used = ?,
                result_note_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(episode.status.to_string())
        .bind(&episode.error_message)
        .bind(i64::from(episode.sources_returned))
        .bind(i64::from(episode.sources_saved))
        .bind(tool_usage_json)
        .bind(i64::from(episode.followup_count))
        .bind(i64::from(episode.senso_search_used))
        .bind(i64::from(episode.senso_generate_used))
        .bind(episode.result_note_id.map(|id| id.to_string()))
        .bind(episode.updated_at.to_rfc3339())
        .bind(episode.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::RowNotFound.into());
        }
        Ok(())
    }

    async fn get(&self, episode_id: Uuid) -> OrchestratorResult<Option<Episode>> {
        let row: Option<EpisodeRow> = sqlx::query_as("SELECT * FROM episodes WHERE id = ?")
            .bind(episode_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        row.map(Episode::try_from).transpose().map_err(Into::into)
    }

    async fn recent_for_topic(&self, topic_id: Uuid, limit: u32) -> OrchestratorResult<Vec<Episode>> {
        let rows: Vec<EpisodeRow> = sqlx::query_as(
            "SELECT * FROM episodes WHERE topic_id = ? AND status = 'completed'
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(topic_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(PersistenceError::QueryFailed)?;
        rows.into_iter().map(Episode::try_from).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn count_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM episodes WHERE topic_id = ?")
            .bind(topic_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(PersistenceError::QueryFailed)?;
        Ok(u64::try_from(row.0).unwrap_or(0))
    }
}
