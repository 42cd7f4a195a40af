//! Core domain entities: plain data + invariant-preserving constructors, no I/O.

mod episode;
mod evolution_log;
mod note;
mod strategy;
mod topic;

pub use episode::{Episode, EpisodeStatus, ToolUsage};
pub use evolution_log::EvolutionLogEntry;
pub use note::Note;
pub use strategy::{SearchDepth, Strategy, StrategyConfig, StrategyStatus, TimeWindow, ToolKind};
pub use topic::Topic;
