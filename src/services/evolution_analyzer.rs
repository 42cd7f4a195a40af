//! Evolution Analyzer (spec §4.7): the background job that decides, after
//! each completed episode, whether a topic's active strategy should mutate
//! into a new candidate version.
//!
//! The mutation table is modeled as data (a fixed-order rule table of
//! trigger/mutate function pairs) rather than as a chain of `if` branches, so
//! an operator tuning the thresholds only ever touches `MUTATION_RULES`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use uuid::Uuid;

use super::model_tiers;
use super::strategy_store::StrategyStoreService;
use crate::domain::models::{Episode, SearchDepth, StrategyConfig, ToolKind};
use crate::domain::ports::{EpisodeRepository, EvolutionLogRepository};

/// `N = max(minEpisodes, 10)` (spec §4.7 step 1).
const MIN_WINDOW: u32 = 10;

/// Aggregate metrics over the analysis window (spec §4.7 step 2).
#[derive(Debug, Clone, Copy)]
struct WindowMetrics {
    save_rate: f64,
    avg_followups: f64,
    senso_usage_rate: f64,
}

fn aggregate(episodes: &[Episode]) -> WindowMetrics {
    let n = episodes.len().max(1) as f64;
    let save_rate = episodes.iter().map(Episode::raw_save_rate).sum::<f64>() / n;
    let avg_followups = episodes.iter().map(|e| f64::from(e.followup_count)).sum::<f64>() / n;
    let senso_users = episodes.iter().filter(|e| e.senso_search_used || e.senso_generate_used).count();
    let senso_usage_rate = senso_users as f64 / n;
    WindowMetrics { save_rate, avg_followups, senso_usage_rate }
}

/// One row of the mutation table (spec §4.7 step 4). `trigger` inspects the
/// window metrics; `mutate` applies the corresponding change in place and
/// returns a human-readable clause describing what it changed, or `None` if
/// it turned out to be a no-op against the current config (e.g. `model`
/// already at the top tier).
struct MutationRule {
    trigger: fn(WindowMetrics) -> bool,
    mutate: fn(&mut StrategyConfig) -> Option<(&'static str, Value)>,
    reason: &'static str,
}

const MUTATION_RULES: &[MutationRule] = &[
    MutationRule {
        trigger: |m| m.save_rate < 0.40,
        mutate: |c| {
            let mut changed = false;
            if c.search_depth != SearchDepth::Shallow {
                c.search_depth = SearchDepth::Shallow;
                changed = true;
            }
            if c.time_window != crate::domain::models::TimeWindow::Month {
                c.time_window = crate::domain::models::TimeWindow::Month;
                changed = true;
            }
            changed.then(|| ("low_save_rate", json!({"searchDepth": "shallow", "timeWindow": "month"})))
        },
        reason: "Low save rate",
    },
    MutationRule {
        trigger: |m| m.avg_followups > 8.0,
        mutate: |c| {
            let mut changed = false;
            if c.max_followups != Some(3) {
                c.max_followups = Some(3);
                changed = true;
            }
            if c.search_depth == SearchDepth::Deep {
                c.search_depth = SearchDepth::Standard;
                changed = true;
            }
            changed.then(|| ("high_avg_followups", json!({"maxFollowups": 3, "searchDepthCapped": "not deep"})))
        },
        reason: "High average follow-up count",
    },
    MutationRule {
        trigger: |m| m.senso_usage_rate < 0.20,
        mutate: |c| {
            (!c.senso_first).then(|| {
                c.senso_first = true;
                ("low_senso_usage", json!({"sensoFirst": true}))
            })
        },
        reason: "Low senso usage rate",
    },
    MutationRule {
        trigger: |m| m.save_rate < 0.50,
        mutate: |c| {
            let higher = model_tiers::next_higher(&c.model);
            (higher != c.model).then(|| {
                let from = c.model.clone();
                c.model = higher.clone();
                ("save_rate_below_half", json!({"model": {"from": from, "to": higher}}))
            })
        },
        reason: "Save rate below 50%",
    },
    MutationRule {
        trigger: |m| m.save_rate > 0.70,
        mutate: |c| {
            let lower = model_tiers::next_lower(&c.model);
            (lower != c.model).then(|| {
                let from = c.model.clone();
                c.model = lower.clone();
                ("save_rate_above_seventy", json!({"model": {"from": from, "to": lower}}))
            })
        },
        reason: "Save rate above 70%",
    },
    MutationRule {
        trigger: |m| m.avg_followups > 6.0,
        mutate: |c| {
            (!c.parallel_searches).then(|| {
                c.parallel_searches = true;
                ("high_followups_enable_parallel", json!({"parallelSearches": true}))
            })
        },
        reason: "Average follow-up count above 6",
    },
    MutationRule {
        trigger: |m| m.save_rate == 0.0,
        mutate: |c| {
            c.has_tool(ToolKind::Evaluate).then(|| {
                c.tools.retain(|t| *t != ToolKind::Evaluate);
                ("zero_save_rate_drop_evaluate", json!({"tools": "evaluate removed"}))
            })
        },
        reason: "Zero save rate",
    },
    MutationRule {
        trigger: |m| m.save_rate > 0.60,
        mutate: |c| {
            (!c.has_tool(ToolKind::Evaluate)).then(|| {
                c.tools.push(ToolKind::Evaluate);
                ("save_rate_above_sixty_restore_evaluate", json!({"tools": "evaluate ensured"}))
            })
        },
        reason: "Save rate above 60%",
    },
];

pub struct EvolutionAnalyzer {
    episodes: Arc<dyn EpisodeRepository>,
    evolution_log: Arc<dyn EvolutionLogRepository>,
    strategy_store: Arc<StrategyStoreService>,
    min_episodes: u32,
    /// In-process idempotency guard (spec §4.7, "idempotent within the same
    /// episode id"). A durable guard also exists via
    /// `EvolutionLogRepository::exists_for_version`, but that only protects
    /// against a *second write*, not a concurrent *second run* racing to
    /// compute one; this set short-circuits the common case cheaply.
    processed: Mutex<HashSet<Uuid>>,
}

impl EvolutionAnalyzer {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        evolution_log: Arc<dyn EvolutionLogRepository>,
        strategy_store: Arc<StrategyStoreService>,
        min_episodes: u32,
    ) -> Self {
        Self { episodes, evolution_log, strategy_store, min_episodes: min_episodes.max(1), processed: Mutex::new(HashSet::new()) }
    }

    /// Runs the analysis for one just-completed episode (spec §4.7). Never
    /// propagates an error to the caller: the episode runtime fires this as
    /// a detached, best-effort hook and failures here must not affect the
    /// episode's own recorded outcome.
    pub async fn on_episode_completed(&self, topic_id: Uuid, episode_id: Uuid) {
        if let Err(err) = self.try_analyze(topic_id, episode_id).await {
            tracing::warn!(%topic_id, %episode_id, error = %err, "evolution analysis failed, swallowing");
        }
    }

    async fn try_analyze(&self, topic_id: Uuid, episode_id: Uuid) -> Result<(), crate::domain::error::OrchestratorError> {
        {
            let mut processed = self.processed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if !processed.insert(episode_id) {
                return Ok(());
            }
        }

        let Some(active) = self.strategy_store.get_active(topic_id).await? else {
            return Ok(());
        };

        let window = MIN_WINDOW.max(self.min_episodes);
        let recent = self.episodes.recent_for_topic(topic_id, window).await?;
        if recent.is_empty() {
            return Ok(());
        }

        let metrics = aggregate(&recent);

        let mut new_config = active.config.clone();
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut changes = serde_json::Map::new();
        for rule in MUTATION_RULES {
            if (rule.trigger)(metrics) {
                if let Some((key, value)) = (rule.mutate)(&mut new_config) {
                    clauses.push(rule.reason);
                    changes.insert(key.to_string(), value);
                }
            }
        }

        if changes.is_empty() {
            tracing::debug!(%topic_id, %episode_id, "evolution analysis: keep");
            return Ok(());
        }

        if self.evolution_log.exists_for_version(topic_id, active.version + 1).await? {
            return Ok(());
        }

        let reason = format!(
            "{} across {} episodes (saveRate={:.2}, avgFollowups={:.1}, sensoUsageRate={:.2})",
            clauses.join(", "),
            recent.len(),
            metrics.save_rate,
            metrics.avg_followups,
            metrics.senso_usage_rate
        );

        self.strategy_store
            .create_candidate(topic_id, new_config, active.version, reason, Value::Object(changes))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::error::OrchestratorResult;
    use crate::domain::models::{EvolutionLogEntry, Topic};
    use crate::domain::ports::{RngSource, StrategyRepository, TopicRepository};

    struct ZeroRng;
    impl RngSource for ZeroRng {
        fn next_weight(&self) -> u8 {
            0
        }
    }

    #[derive(Default)]
    struct InMemoryEpisodes {
        rows: tokio::sync::Mutex<Vec<Episode>>,
    }
    #[async_trait]
    impl EpisodeRepository for InMemoryEpisodes {
        async fn insert(&self, episode: &Episode) -> OrchestratorResult<()> {
            self.rows.lock().await.push(episode.clone());
            Ok(())
        }
        async fn update(&self, episode: &Episode) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            if let Some(existing) = rows.iter_mut().find(|e| e.id == episode.id) {
                *existing = episode.clone();
            }
            Ok(())
        }
        async fn get(&self, episode_id: Uuid) -> OrchestratorResult<Option<Episode>> {
            Ok(self.rows.lock().await.iter().find(|e| e.id == episode_id).cloned())
        }
        async fn recent_for_topic(&self, topic_id: Uuid, limit: u32) -> OrchestratorResult<Vec<Episode>> {
            let rows = self.rows.lock().await;
            let mut matching: Vec<Episode> = rows.iter().filter(|e| e.topic_id == topic_id).cloned().collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            matching.truncate(limit as usize);
            Ok(matching)
        }
        async fn count_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<u64> {
            Ok(self.rows.lock().await.iter().filter(|e| e.topic_id == topic_id).count() as u64)
        }
    }

    #[derive(Default)]
    struct InMemoryStrategies {
        rows: tokio::sync::Mutex<Vec<crate::domain::models::Strategy>>,
    }
    #[async_trait]
    impl StrategyRepository for InMemoryStrategies {
        async fn insert(&self, strategy: &crate::domain::models::Strategy) -> OrchestratorResult<()> {
            self.rows.lock().await.push(strategy.clone());
            Ok(())
        }
        async fn get_active(&self, topic_id: Uuid) -> OrchestratorResult<Option<crate::domain::models::Strategy>> {
            Ok(self.rows.lock().await.iter().find(|s| s.topic_id == topic_id && s.is_active()).cloned())
        }
        async fn get_version(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<Option<crate::domain::models::Strategy>> {
            Ok(self.rows.lock().await.iter().find(|s| s.topic_id == topic_id && s.version == version).cloned())
        }
        async fn list_versions(&self, topic_id: Uuid) -> OrchestratorResult<Vec<crate::domain::models::Strategy>> {
            Ok(self.rows.lock().await.iter().filter(|s| s.topic_id == topic_id).cloned().collect())
        }
        async fn highest_version(&self, topic_id: Uuid) -> OrchestratorResult<Option<i64>> {
            Ok(self.rows.lock().await.iter().filter(|s| s.topic_id == topic_id).map(|s| s.version).max())
        }
        async fn promote(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            for s in rows.iter_mut().filter(|s| s.topic_id == topic_id) {
                s.status = if s.version == version {
                    crate::domain::models::StrategyStatus::Active
                } else if s.is_active() {
                    crate::domain::models::StrategyStatus::Archived
                } else {
                    s.status
                };
            }
            Ok(())
        }
        async fn archive(&self, topic_id: Uuid, version: i64) -> OrchestratorResult<()> {
            let mut rows = self.rows.lock().await;
            if let Some(s) = rows.iter_mut().find(|s| s.topic_id == topic_id && s.version == version) {
                s.status = crate::domain::models::StrategyStatus::Archived;
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
    struct InMemoryTopics;
    #[async_trait]
    impl TopicRepository for InMemoryTopics {
        async fn create(&self, _topic: &Topic) -> OrchestratorResult<()> {
            Ok(())
        }
        async fn get(&self, _topic_id: Uuid) -> OrchestratorResult<Option<Topic>> {
            Ok(None)
        }
        async fn list(&self) -> OrchestratorResult<Vec<Topic>> {
            Ok(vec![])
        }
        async fn set_active_strategy_version(&self, _topic_id: Uuid, _version: i64) -> OrchestratorResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryEvolutionLog {
        entries: tokio::sync::Mutex<Vec<EvolutionLogEntry>>,
    }
    #[async_trait]
    impl EvolutionLogRepository for InMemoryEvolutionLog {
        async fn insert(&self, entry: &EvolutionLogEntry) -> OrchestratorResult<()> {
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }
        async fn list_for_topic(&self, topic_id: Uuid) -> OrchestratorResult<Vec<EvolutionLogEntry>> {
            Ok(self.entries.lock().await.iter().filter(|e| e.topic_id == topic_id).cloned().collect())
        }
        async fn exists_for_version(&self, topic_id: Uuid, to_version: i64) -> OrchestratorResult<bool> {
            Ok(self.entries.lock().await.iter().any(|e| e.topic_id == topic_id && e.to_version == to_version))
        }
    }

    fn episode_with_rates(topic_id: Uuid, sources_returned: u32, sources_saved: u32, followups: u32) -> Episode {
        let mut ep = Episode::new(topic_id, 1, "q".to_string(), None);
        ep.sources_returned = sources_returned;
        ep.sources_saved = sources_saved;
        ep.followup_count = followups;
        ep.complete(Uuid::new_v4());
        ep
    }

    struct Harness {
        analyzer: EvolutionAnalyzer,
        strategies: Arc<InMemoryStrategies>,
        evolution_log: Arc<InMemoryEvolutionLog>,
    }

    fn harness() -> Harness {
        let episodes: Arc<dyn EpisodeRepository> = Arc::new(InMemoryEpisodes::default());
        let strategies = Arc::new(InMemoryStrategies::default());
        let evolution_log = Arc::new(InMemoryEvolutionLog::default());
        let store = Arc::new(StrategyStoreService::new(
            strategies.clone() as Arc<dyn StrategyRepository>,
            Arc::new(InMemoryTopics),
            evolution_log.clone() as Arc<dyn EvolutionLogRepository>,
            Arc::new(ZeroRng),
            "research-standard",
        ));
        let analyzer = EvolutionAnalyzer::new(episodes, evolution_log.clone() as Arc<dyn EvolutionLogRepository>, store, 5);
        Harness { analyzer, strategies, evolution_log }
    }

    #[tokio::test]
    async fn low_save_rate_creates_candidate_with_expected_changes() {
        let h = harness();
        let topic_id = Uuid::new_v4();
        h.strategies.insert(&crate::domain::models::Strategy {
            topic_id,
            version: 1,
            status: crate::domain::models::StrategyStatus::Active,
            rollout_percentage: 100,
            parent_version: None,
            config: StrategyConfig::default_for_new_topic("research-standard"),
            created_at: chrono::Utc::now(),
        }).await.unwrap();

        for _ in 0..10 {
            h.analyzer
                .episodes
                .insert(&episode_with_rates(topic_id, 10, 1, 0))
                .await
                .unwrap();
        }

        h.analyzer.on_episode_completed(topic_id, Uuid::new_v4()).await;

        let entries = h.evolution_log.list_for_topic(topic_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_version, 2);
        assert!(entries[0].changes.get("low_save_rate").is_some());
    }

    #[tokio::test]
    async fn healthy_metrics_keep_strategy_unchanged() {
        let h = harness();
        let topic_id = Uuid::new_v4();
        let mut config = StrategyConfig::default_for_new_topic("research-standard");
        // already senso-first, so the low-senso-usage rule's mutate closure
        // is a no-op even though its trigger fires on these episodes.
        config.senso_first = true;
        h.strategies.insert(&crate::domain::models::Strategy {
            topic_id,
            version: 1,
            status: crate::domain::models::StrategyStatus::Active,
            rollout_percentage: 100,
            parent_version: None,
            config,
            created_at: chrono::Utc::now(),
        }).await.unwrap();

        for _ in 0..10 {
            h.analyzer
                .episodes
                .insert(&episode_with_rates(topic_id, 10, 6, 1))
                .await
                .unwrap();
        }

        h.analyzer.on_episode_completed(topic_id, Uuid::new_v4()).await;

        assert!(h.evolution_log.list_for_topic(topic_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_episode_id_analyzed_only_once() {
        let h = harness();
        let topic_id = Uuid::new_v4();
        h.strategies.insert(&crate::domain::models::Strategy {
            topic_id,
            version: 1,
            status: crate::domain::models::StrategyStatus::Active,
            rollout_percentage: 100,
            parent_version: None,
            config: StrategyConfig::default_for_new_topic("research-standard"),
            created_at: chrono::Utc::now(),
        }).await.unwrap();
        for _ in 0..10 {
            h.analyzer
                .episodes
                .insert(&episode_with_rates(topic_id, 10, 1, 0))
                .await
                .unwrap();
        }

        let episode_id = Uuid::new_v4();
        h.analyzer.on_episode_completed(topic_id, episode_id).await;
        h.analyzer.on_episode_completed(topic_id, episode_id).await;

        assert_eq!(h.evolution_log.list_for_topic(topic_id).await.unwrap().len(), 1);
    }
}
