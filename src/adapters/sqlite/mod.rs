//! SQLite-backed implementations of the domain's persistence ports.

pub mod connection;
pub mod episode_repository;
pub mod evolution_log_repository;
pub mod migrations;
pub mod note_repository;
pub mod strategy_repository;
pub mod topic_repository;

pub use episode_repository::SqliteEpisodeRepository;
pub use evolution_log_repository::SqliteEvolutionLogRepository;
pub use note_repository::SqliteNoteRepository;
pub use strategy_repository::SqliteStrategyRepository;
pub use topic_repository::SqliteTopicRepository;
