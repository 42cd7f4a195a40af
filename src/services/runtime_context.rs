//! Ambient per-episode runtime context (spec §4.8).
//!
//! Propagated explicitly as the first argument to every tool wrapper rather
//! than through a process-wide global, so that concurrently running episodes
//! never observe each other's strategy config or cancellation state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::models::StrategyConfig;
use crate::services::metrics::MetricAccumulator;

/// Everything a tool call or state-machine step needs to know about the
/// episode it is running inside.
#[derive(Clone)]
pub struct EpisodeContext {
    pub episode_id: Uuid,
    pub topic_id: Uuid,
    pub strategy_version: i64,
    pub config: Arc<StrategyConfig>,
    pub trace_id: Uuid,
    pub cancel: CancellationToken,
    pub metrics: Arc<MetricAccumulator>,
}

impl EpisodeContext {
    pub fn new(episode_id: Uuid, topic_id: Uuid, strategy_version: i64, config: Arc<StrategyConfig>) -> Self {
        Self {
            episode_id,
            topic_id,
            strategy_version,
            config,
            trace_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            metrics: Arc::new(MetricAccumulator::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
