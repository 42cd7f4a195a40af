//! Shared application state handed to every axum handler, mirroring
//! `adapters::mcp::events_http::EventsState`'s single `Arc<State>` extractor
//! shape.

use std::sync::Arc;

use crate::domain::ports::{EpisodeRepository, EvolutionLogRepository, NoteRepository, TopicRepository};
use crate::services::{EpisodeRuntime, StrategyStoreService};

/// Shared handles every axum handler needs: repositories for read endpoints,
/// plus the two services (strategy selection, episode orchestration) that do
/// the actual work.

#[derive(Clone)]
pub struct AppState {
    pub topics: Arc<dyn TopicRepository>,
    pub episodes: Arc<dyn EpisodeRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub evolution_log: Arc<dyn EvolutionLogRepository>,
    pub strategy_store: Arc<StrategyStoreService>,
    pub episode_runtime: Arc<EpisodeRuntime>,
}
