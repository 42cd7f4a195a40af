//! Strategy Store (spec §4.1): CRUD on strategies plus the deterministic,
//! seedable-RNG version selection per query.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::error::StrategyError;
use crate::domain::models::{Strategy, StrategyConfig, StrategyStatus};
use crate::domain::ports::{EvolutionLogRepository, RngSource, StrategyRepository, TopicRepository};

/// Initial rollout percentage a freshly created candidate receives (spec §4.1).
const CANDIDATE_INITIAL_ROLLOUT: u8 = 20;
/// Once candidate rollout would exceed this, the oldest candidate is archived first.
const MAX_CANDIDATE_ROLLOUT_BUDGET: u32 = 80;

pub struct StrategyStoreService {
    strategies: Arc<dyn StrategyRepository>,
    topics: Arc<dyn TopicRepository>,
    evolution_log: Arc<dyn EvolutionLogRepository>,
    rng: Arc<dyn RngSource>,
    default_model: String,
}

impl StrategyStoreService {
    pub fn new(
        strategies: Arc<dyn StrategyRepository>,
        topics: Arc<dyn TopicRepository>,
        evolution_log: Arc<dyn EvolutionLogRepository>,
        rng: Arc<dyn RngSource>,
        default_model: impl Into<String>,
    ) -> Self {
        Self { strategies, topics, evolution_log, rng, default_model: default_model.into() }
    }

    pub async fn get_active(&self, topic_id: Uuid) -> Result<Option<Strategy>, StrategyError> {
        self.strategies.get_active(topic_id).await.map_err(|_| StrategyError::UnknownTopic(topic_id))
    }

    pub async fn list_versions(&self, topic_id: Uuid) -> Result<Vec<Strategy>, StrategyError> {
        self.strategies.list_versions(topic_id).await.map_err(|_| StrategyError::UnknownTopic(topic_id))
    }

    /// Called once when a topic is created (spec §4.1).
    pub async fn create_default(&self, topic_id: Uuid) -> Result<Strategy, StrategyError> {
        let strategy = Strategy {
            topic_id,
            version: 1,
            status: StrategyStatus::Active,
            rollout_percentage: 100,
            parent_version: None,
            config: StrategyConfig::default_for_new_topic(self.default_model.clone()),
            created_at: chrono::Utc::now(),
        };
        self.strategies.insert(&strategy).await.map_err(|_| StrategyError::UnknownTopic(topic_id))?;
        Ok(strategy)
    }

    /// Weighted random choice among `{active, candidate}` strategies using
    /// `rolloutPercentage` as weights, normalized if they do not sum to 100
    /// (spec §4.1).
    pub async fn select_for_query(&self, topic_id: Uuid) -> Result<Strategy, StrategyError> {
        let all = self.strategies.list_versions(topic_id).await.map_err(|_| StrategyError::UnknownTopic(topic_id))?;
        let mut eligible: Vec<Strategy> =
            all.into_iter().filter(|s| matches!(s.status, StrategyStatus::Active | StrategyStatus::Candidate)).collect();

        if eligible.is_empty() {
            return Err(StrategyError::NoStrategyConfigured(topic_id));
        }
        if eligible.len() == 1 {
            return Ok(eligible.remove(0));
        }

        let total_weight: u32 = eligible.iter().map(|s| u32::from(s.rollout_percentage)).sum();
        if total_weight == 0 {
            // Degenerate configuration: fall back to the active strategy if
            // one exists, else the first eligible version.
            return Ok(eligible
                .iter()
                .find(|s| s.is_active())
                .cloned()
                .unwrap_or_else(|| eligible[0].clone()));
        }

        let draw = u32::from(self.rng.next_weight()) * total_weight / 100;
        let mut cumulative = 0u32;
        for strategy in &eligible {
            cumulative += u32::from(strategy.rollout_percentage);
            if draw < cumulative {
                return Ok(strategy.clone());
            }
        }
        Ok(eligible.last().expect("checked non-empty above").clone())
    }

    /// Atomically promotes `version` to active, demoting any previously
    /// active version (spec §4.1).
    pub async fn promote(&self, topic_id: Uuid, version: i64) -> Result<(), StrategyError> {
        let target = self
            .strategies
            .get_version(topic_id, version)
            .await
            .map_err(|_| StrategyError::UnknownTopic(topic_id))?
            .ok_or(StrategyError::UnknownVersion { topic_id, version })?;
        let _ = target;
        self.strategies.promote(topic_id, version).await.map_err(|_| StrategyError::UnknownTopic(topic_id))?;
        self.topics
            .set_active_strategy_version(topic_id, version)
            .await
            .map_err(|_| StrategyError::UnknownTopic(topic_id))?;
        Ok(())
    }

    /// Creates a new candidate version (spec §4.1). Archives the oldest
    /// candidate first if total candidate rollout would otherwise exceed
    /// 80%, and records the accompanying `EvolutionLogEntry`.
    pub async fn create_candidate(
        &self,
        topic_id: Uuid,
        config: StrategyConfig,
        from_version: i64,
        reason: String,
        changes: Value,
    ) -> Result<Strategy, StrategyError> {
        let all = self.strategies.list_versions(topic_id).await.map_err(|_| StrategyError::UnknownTopic(topic_id))?;
        let mut candidates: Vec<&Strategy> = all.iter().filter(|s| s.status == StrategyStatus::Candidate).collect();
        candidates.sort_by_key(|s| s.created_at);

        let existing_rollout: u32 = candidates.iter().map(|s| u32::from(s.rollout_percentage)).sum();
        if existing_rollout + u32::from(CANDIDATE_INITIAL_ROLLOUT) > MAX_CANDIDATE_ROLLOUT_BUDGET {
            if let Some(oldest) = candidates.first() {
                self.strategies
                    .archive(topic_id, oldest.version)
                    .await
                    .map_err(|_| StrategyError::UnknownTopic(topic_id))?;
            }
        }

        let next_version = self
            .strategies
            .highest_version(topic_id)
            .await
            .map_err(|_| StrategyError::UnknownTopic(topic_id))?
            .map_or(1, |v| v + 1);

        let strategy = Strategy {
            topic_id,
            version: next_version,
            status: StrategyStatus::Candidate,
            rollout_percentage: CANDIDATE_INITIAL_ROLLOUT,
            parent_version: Some(from_version),
            config,
            created_at: chrono::Utc::now(),
        };

        self.strategies.insert(&strategy).await.map_err(|e| {
            if is_unique_violation(&e) {
                StrategyError::VersionConflict(topic_id)
            } else {
                StrategyError::UnknownTopic(topic_id)
            }
        })?;

        let entry = crate::domain::models::EvolutionLogEntry::new(topic_id, Some(from_version), next_version, reason, changes);
        self.evolution_log.insert(&entry).await.map_err(|_| StrategyError::UnknownTopic(topic_id))?;

        Ok(strategy)
    }
}

fn is_unique_violation(err: &crate::domain::error::OrchestratorError) -> bool {
    matches!(err, crate::domain::error::OrchestratorError::Persistence(crate::domain::error::PersistenceError::QueryFailed(sqlx_err))
        if sqlx_err.as_database_error().is_some_and(|e| e.is_unique_violation()))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::error::OrchestratorResult;

    struct FixedRng(u8);
    impl RngSource for FixedRng {
        fn next_weight(&self) -> u8 {
            self.0
        }
    }

    #[derive(Default)]
    struct InMemoryStrategies {
        rows: tokio::sync::Mutex<Vec<Strategy>>,
    }

    #[async_trait]
    impl StrategyRepository for InMemoryStrategies {
        async fn insert(&self, strategy: &Strategy) -> OrchestratorResult<()> {
            self.rows.lock().await.push(strategy.clone());
            Ok(())
        }
        async fn get_active(&self, topic_id: Uuid) -> OrchestratorResult<Option<Strategy>> {
            Ok(self.rows.lock().await.iter().find(|s| s.topic_id == topic_id && s.is_active()).cloned())
        }
        async fn get_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<Option<Strategy>> {
            Ok(self.rows.lock().await.iter().find(|s| s.topic_id == topic_id && s.version == version).cloned())
        }
        async fn list_versions(&self, topic_id: Uuid) -> OrchestratorResult<Vec<Strategy>> {
            Ok(self.rows.lock().await.iter().filter(|s| s.topic_id == topic_id).cloned().collect())
        }
        async fn highest_version(&self, topic_id: Uuid) -> OrchestratorResult<Option<i64>> {
            Ok(self.rows.lock().await.iter().filter(|s| s.topic_id == topic_id).map(|s| s.version).max())
        }
        async fn promote(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            for s in rows.iter_mut().filter(|s| s.topic_id == topic_id) {
                if s.version == version {
                    s.status = StrategyStatus::Active;
                    s.rollout_percentage = 100;
                } else if s.is_active() {
                    s.status = StrategyStatus::Archived;
                }
            }
            Ok(())
        }
        async fn archive(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            if let Some(s) = rows.iter_mut().find(|s| s.topic_id == topic_id && s.version == version) {
                s.status = StrategyStatus::Archived;
            }
            Ok(())
        }
        async fn set_rollout_percentage(&self, topic_id: Uuid, version: i64, percentage: u8) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            if let Some(s) = rows.iter_mut().find(|s| s.topic_id == topic_id && s.version == version) {
                s.rollout_percentage = percentage;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryTopics {
        updates: tokio::sync::Mutex<Vec<(Uuid, i64)>>,
    }
    #[async_trait]
    impl TopicRepository for InMemoryTopics {
        async fn create(&self, _topic: &crate::domain::models::Topic) -> OrchestratorResult<()> {
            Ok(())
        }
        async fn get(&self, _topic_id: Uuid) -> OrchestratorResult<Option<crate::domain::models::Topic>> {
            Ok(None)
        }
        async fn list(&self) -> OrchestratorResult<Vec<crate::domain::models::Topic>> {
            Ok(vec![])
        }
        async fn set_active_strategy_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
            self.updates.lock().await.push((topic_id, version));
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryEvolutionLog {
        entries: tokio::sync::Mutex<Vec<crate::domain::models::EvolutionLogEntry>>,
    }
    #[async_trait]
    impl EvolutionLogRepository for InMemoryEvolutionLog {
        async fn insert(&self, entry: &crate::domain::models::EvolutionLogEntry) -> OrchestratorResult<()> {
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }
        async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<crate::domain::models::EvolutionLogEntry>> {
            Ok(self.entries.lock().await.iter().filter(|e| e.topic_id == topic_id).cloned().collect())
        }
        async fn exists_for_version(&self, topic_id: Uuid, to_version: i64) -> OrchestratorResult<bool> {
            Ok(self.entries.lock().await.iter().any(|e| e.topic_id == topic_id && e.to_version == to_version))
        }
    }

    fn store(seed: u8) -> StrategyStoreService {
        StrategyStoreService::new(
            Arc::new(InMemoryStrategies::default()),
            Arc::new(InMemoryTopics::default()),
            Arc::new(InMemoryEvolutionLog::default()),
            Arc::new(FixedRng(seed)),
            "research-standard",
        )
    }

    #[tokio::test]
    async fn create_default_is_active_with_full_rollout() {
        let store = store(0);
        let topic_id = Uuid::new_v4();
        let strategy = store.create_default(topic_id).await.unwrap();
        assert_eq!(strategy.version, 1);
        assert!(strategy.is_active());
        assert_eq!(strategy.rollout_percentage, 100);
    }

    #[tokio::test]
    async fn select_for_query_fails_when_no_strategy_exists() {
        let store = store(0);
        let result = store.select_for_query(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StrategyError::NoStrategyConfigured(_))));
    }

    #[tokio::test]
    async fn select_for_query_returns_sole_active_when_no_candidates() {
        let store = store(50);
        let topic_id = Uuid::new_v4();
        store.create_default(topic_id).await.unwrap();
        let selected = store.select_for_query(topic_id).await.unwrap();
        assert!(selected.is_active());
    }

    #[tokio::test]
    async fn low_draw_picks_active_high_draw_picks_candidate() {
        let topic_id = Uuid::new_v4();

        let low = store(10);
        low.create_default(topic_id).await.unwrap();
        low.create_candidate(topic_id, StrategyConfig::default_for_new_topic("m"), 1, "test".into(), serde_json::json!({}))
            .await
            .unwrap();
        let picked_low = low.select_for_query(topic_id).await.unwrap();
        assert!(picked_low.is_active());

        let high = store(99);
        high.create_default(topic_id).await.unwrap();
        high.create_candidate(topic_id, StrategyConfig::default_for_new_topic("m"), 1, "test".into(), serde_json::json!({}))
            .await
            .unwrap();
        let picked_high = high.select_for_query(topic_id).await.unwrap();
        assert_eq!(picked_high.status, StrategyStatus::Candidate);
    }

    #[tokio::test]
    async fn create_candidate_records_evolution_log_entry() {
        let store = store(0);
        let topic_id = Uuid::new_v4();
        store.create_default(topic_id).await.unwrap();
        let candidate = store
            .create_candidate(
                topic_id,
                StrategyConfig::default_for_new_topic("m"),
                1,
                "Low avg save rate (15%) across 10 episodes".into(),
                serde_json::json!({"searchDepth": {"from": "standard", "to": "shallow"}}),
            )
            .await
            .unwrap();
        assert_eq!(candidate.version, 2);
        assert_eq!(candidate.parent_version, Some(1));
        assert_eq!(candidate.rollout_percentage, 20);
    }

    #[tokio::test]
    async fn promote_demotes_previous_active() {
        let store = store(0);
        let topic_id = Uuid::new_v4();
        store.create_default(topic_id).await.unwrap();
        let candidate = store
            .create_candidate(topic_id, StrategyConfig::default_for_new_topic("m"), 1, "r".into(), serde_json::json!({}))
            .await
            .unwrap();
        store.promote(topic_id, candidate.version).await.unwrap();

        let versions = store.list_versions(topic_id).await.unwrap();
        let active_count = versions.iter().filter(|s| s.is_active()).count();
        assert_eq!(active_count, 1);
        assert!(versions.iter().find(|s| s.version == candidate.version).unwrap().is_active());
        assert_eq!(versions.iter().find(|s| s.version == 1).unwrap().status, StrategyStatus::Archived);
    }
}
