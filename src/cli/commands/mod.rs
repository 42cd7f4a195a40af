//! One module per subcommand group, following
//! `cli::commands::{task, swarm}`'s layout.

pub mod ask;
pub mod strategy;
pub mod topic;

/// Handles bundled together for CLI command handlers: every repository and
/// service the operator surface needs, so `main`'s bin entry point can build
/// this once and hand it to whichever subcommand the user ran.
pub struct CliContext {
    pub topics: std::sync::Arc<dyn crate::domain::ports::TopicRepository>,
    pub episodes: std::sync::Arc<dyn crate::domain::ports::EpisodeRepository>,
    pub notes: std::sync::Arc<dyn crate::domain::ports::NoteRepository>,
    pub evolution_log: std::sync::Arc<dyn crate::domain::ports::EvolutionLogRepository>,
    pub strategy_store: std::sync::Arc<crate::services::StrategyStoreService>,
    pub episode_runtime: std::sync::Arc<crate::services::EpisodeRuntime>,
}
