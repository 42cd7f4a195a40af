//! Self-evolving research orchestrator: strategy lifecycle and evolution,
//! per-query episode runtime, the two-phase search/evaluate/extract/
//! synthesize state machine, and the SSE event bus that streams it all to
//! operators.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::error::{OrchestratorError, OrchestratorResult};
pub use infrastructure::{Config, ConfigLoader};
