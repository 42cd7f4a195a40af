//! Episode Runtime (spec §4.2): orchestrates one query end to end — strategy
//! selection, episode bookkeeping, the research state machine, and the
//! terminal Note/Episode write — and schedules the post-episode evolution
//! hook without blocking the caller's event stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::error::{EpisodeError, OrchestratorError, OrchestratorResult, StrategyError};
use crate::domain::models::Episode;
use crate::domain::ports::{EpisodeRepository, NoteRepository};
use crate::services::event_bus::{CoreEvent, EventBus};
use crate::services::evolution_analyzer::EvolutionAnalyzer;
use crate::services::research_state_machine::{self, ResearchOutcome};
use crate::services::runtime_context::EpisodeContext;
use crate::services::strategy_store::StrategyStoreService;
use crate::services::tool_contracts::ToolContracts;

/// One retry after a fixed short delay on a terminal-write persistence
/// failure (spec §7, "retried once with backoff"), grounded on the same
/// retry-then-give-up shape as the adapter's Claude API retry policy, just
/// without its multi-attempt exponential schedule since the spec caps this
/// at a single retry.
const TERMINAL_WRITE_RETRY_DELAY: Duration = Duration::from_millis(250);

pub struct EpisodeRuntime {
    strategy_store: Arc<StrategyStoreService>,
    episodes: Arc<dyn EpisodeRepository>,
    notes: Arc<dyn NoteRepository>,
    tools: Arc<ToolContracts>,
    event_bus: Arc<EventBus>,
    evolution_analyzer: Arc<EvolutionAnalyzer>,
}

impl EpisodeRuntime {
    pub fn new(
        strategy_store: Arc<StrategyStoreService>,
        episodes: Arc<dyn EpisodeRepository>,
        notes: Arc<dyn NoteRepository>,
        tools: Arc<ToolContracts>,
        event_bus: Arc<EventBus>,
        evolution_analyzer: Arc<EvolutionAnalyzer>,
    ) -> Self {
        Self { strategy_store, episodes, notes, tools, event_bus, evolution_analyzer }
    }

    /// Selects a strategy, creates the episode row, and spawns the research
    /// pipeline in the background. Returns immediately with the episode id
    /// and the receiver half of its event channel; the caller (the HTTP SSE
    /// handler) drains that to the wire without waiting on the pipeline.
    ///
    /// A `NoStrategyConfigured` failure is returned directly: with no
    /// strategy there is no `strategyVersion` to write, so no Episode row is
    /// created at all (spec §7 says the episode fails "immediately", which
    /// here means before one ever exists).
    pub async fn start(
        &self,
        topic_id: Uuid,
        query: String,
        user_id: Option<String>,
    ) -> OrchestratorResult<(Uuid, mpsc::Receiver<CoreEvent>)> {
        let strategy = self.strategy_store.select_for_query(topic_id).await?;

        let mut episode = Episode::new(topic_id, strategy.version, query.clone(), user_id);
        self.episodes.insert(&episode).await?;
        episode.start();
        self.episodes.update(&episode).await?;

        let episode_id = episode.id;
        let (emitter, receiver) = self.event_bus.register(episode_id);
        emitter.emit(CoreEvent::EpisodeCreated { episode_id }).await;
        emitter
            .emit(CoreEvent::Status {
                status: "strategy_selected".to_string(),
                message: format!("using strategy v{}", strategy.version),
                details: Some(serde_json::json!({
                    "version": strategy.version,
                    "searchDepth": strategy.config.search_depth.to_string(),
                    "timeWindow": strategy.config.time_window.to_string(),
                    "model": strategy.config.model,
                })),
            })
            .await;

        let ctx = EpisodeContext::new(episode_id, topic_id, strategy.version, Arc::new(strategy.config));

        let episodes = Arc::clone(&self.episodes);
        let notes = Arc::clone(&self.notes);
        let tools = Arc::clone(&self.tools);
        let event_bus = Arc::clone(&self.event_bus);
        let evolution_analyzer = Arc::clone(&self.evolution_analyzer);
        let topic_id_for_hook = topic_id;

        tokio::spawn(async move {
            let result = research_state_machine::run(&ctx, &emitter, tools, &query).await;
            let metrics = ctx.metrics.snapshot().await;
            Self::finish(episodes, notes, episode, result, metrics, &emitter).await;
            event_bus.unregister(episode_id);

            let analyzer = evolution_analyzer;
            tokio::spawn(async move {
                analyzer.on_episode_completed(topic_id_for_hook, episode_id).await;
            });
        });

        Ok((episode_id, receiver))
    }

    /// Cooperatively cancels an in-flight episode (spec §4.8). The
    /// background task observes this on its next cancellation check and
    /// unwinds to `EpisodeError::Cancelled`.
    pub fn cancel(ctx: &EpisodeContext) {
        ctx.cancel();
    }

    async fn finish(
        episodes: Arc<dyn EpisodeRepository>,
        notes: Arc<dyn NoteRepository>,
        mut episode: Episode,
        result: Result<ResearchOutcome, EpisodeError>,
        metrics: crate::services::metrics::MetricsSnapshot,
        emitter: &crate::services::event_bus::EventEmitter,
    ) {
        episode.tool_usage = metrics.tool_usage;
        episode.followup_count = metrics.followup_count;
        episode.senso_search_used = metrics.senso_search_used;
        episode.senso_generate_used = metrics.senso_generate_used;

        match result {
            Ok(outcome) => {
                let note = crate::domain::models::Note::from_synthesis(episode.topic_id, &episode.query, outcome.markdown, None);

                episode.sources_returned = outcome.sources_returned.len() as u32;
                episode.sources_saved = outcome.sources_saved.len() as u32;
                episode.complete(note.id);

                if let Err(err) = Self::write_note_then_episode(&notes, &note, &episodes, &episode).await {
                    tracing::error!(episode_id = %episode.id, error = %err, "terminal write failed after retry, marking episode failed");
                    episode.fail("persistence error writing terminal state");
                    let _ = episodes.update(&episode).await;
                    emitter.emit(CoreEvent::Error { error: "failed to persist episode results".to_string() }).await;
                    return;
                }

                emitter.emit(CoreEvent::NoteCreated { note_id: note.id, note_title: note.title.clone() }).await;
                emitter.emit(CoreEvent::Complete { episode_id: episode.id, note_id: note.id }).await;
            }
            Err(err) => {
                let message = match &err {
                    EpisodeError::Cancelled => "cancelled".to_string(),
                    other => other.to_string(),
                };
                episode.fail(message.clone());
                if let Err(write_err) = Self::with_one_retry(|| episodes.update(&episode)).await {
                    tracing::error!(episode_id = %episode.id, error = %write_err, "failed to persist failed episode state");
                }
                emitter.emit(CoreEvent::Error { error: message }).await;
            }
        }
    }

    async fn write_note_then_episode(
        notes: &Arc<dyn NoteRepository>,
        note: &crate::domain::models::Note,
        episodes: &Arc<dyn EpisodeRepository>,
        episode: &Episode,
    ) -> OrchestratorResult<()> {
        Self::with_one_retry(|| notes.insert(note)).await?;
        Self::with_one_retry(|| episodes.update(episode)).await
    }

    async fn with_one_retry<F, Fut>(mut op: F) -> OrchestratorResult<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = OrchestratorResult<()>>,
    {
        match op().await {
            Ok(()) => Ok(()),
            Err(first_err) => {
                let transient = matches!(&first_err, OrchestratorError::Persistence(p) if p.is_transient());
                if !transient {
                    return Err(first_err);
                }
                tokio::time::sleep(TERMINAL_WRITE_RETRY_DELAY).await;
                op().await
            }
        }
    }
}
