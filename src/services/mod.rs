//! Application services: the orchestration logic that sits between the
//! domain (plain types + ports) and the adapters (I/O). No module here
//! talks to SQLite, HTTP, or the filesystem directly.

pub mod episode_runtime;
pub mod evolution_analyzer;
pub mod event_bus;
pub mod metrics;
pub mod model_tiers;
pub mod research_state_machine;
pub mod runtime_context;
pub mod strategy_store;
pub mod tool_contracts;

pub use episode_runtime::EpisodeRuntime;
pub use evolution_analyzer::EvolutionAnalyzer;
pub use event_bus::{CoreEvent, EventBus, EventEmitter};
pub use metrics::{MetricAccumulator, MetricsSnapshot};
pub use research_state_machine::ResearchOutcome;
pub use runtime_context::EpisodeContext;
pub use strategy_store::StrategyStoreService;
pub use tool_contracts::{ToolContracts, ToolTimeouts};
