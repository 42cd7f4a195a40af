//! Hexagonal ports: interfaces the domain depends on, implemented by
//! `adapters`. No module here performs I/O itself.

mod episode_repository;
mod evolution_log_repository;
mod llm_planner;
mod note_repository;
mod research_tools;
mod rng_source;
mod strategy_repository;
mod topic_repository;
mod vector_store;

pub use episode_repository::EpisodeRepository;
pub use evolution_log_repository::EvolutionLogRepository;
pub use llm_planner::{LlmPlanner, SynthesisInput};
pub use note_repository::NoteRepository;
pub use research_tools::{
    EvaluateInput, EvaluateTool, EvaluateVerdict, EvaluationCriteria, ExtractOutcome, ExtractTool, SearchHit,
    SearchParams, SearchTool,
};
pub use rng_source::RngSource;
pub use strategy_repository::StrategyRepository;
pub use topic_repository::TopicRepository;
pub use vector_store::{RetrievedChunk, VectorStore};
