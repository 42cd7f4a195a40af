//! Per-episode counter accumulation (spec §4.6).
//!
//! Tool calls may run concurrently (`parallelSearches`), so the accumulator
//! guards its state behind a mutex rather than requiring callers to
//! serialize access themselves.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::models::ToolUsage;

/// Accumulates per-tool counters, follow-up count, and senso usage flags
/// over the lifetime of a single episode. Snapshotted into the `Episode`
/// record at the terminal transition; never persisted on its own.
pub struct MetricAccumulator {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tool_usage: HashMap<String, ToolUsage>,
    followup_count: u32,
    senso_search_used: bool,
    senso_generate_used: bool,
}

impl Default for MetricAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    pub async fn record_tool_call(&self, tool: &str, latency_ms: u64, errored: bool) {
        let mut inner = self.inner.lock().await;
        inner.tool_usage.entry(tool.to_string()).or_default().record_call(latency_ms, errored);
    }

    pub async fn add_followups(&self, count: u32) {
        let mut inner = self.inner.lock().await;
        inner.followup_count += count;
    }

    pub async fn followup_count(&self) -> u32 {
        self.inner.lock().await.followup_count
    }

    pub async fn mark_senso_search_used(&self) {
        self.inner.lock().await.senso_search_used = true;
    }

    pub async fn mark_senso_generate_used(&self) {
        self.inner.lock().await.senso_generate_used = true;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().await;
        MetricsSnapshot {
            tool_usage: inner.tool_usage.clone(),
            followup_count: inner.followup_count,
            senso_search_used: inner.senso_search_used,
            senso_generate_used: inner.senso_generate_used,
        }
    }
}

/// An immutable point-in-time read of the accumulator, used to populate the
/// terminal `Episode` write.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub tool_usage: HashMap<String, ToolUsage>,
    pub followup_count: u32,
    pub senso_search_used: bool,
    pub senso_generate_used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accumulates_tool_calls_across_concurrent_writers() {
        let acc = MetricAccumulator::new();
        let a = acc.record_tool_call("search", 10, false);
        let b = acc.record_tool_call("search", 20, true);
        tokio::join!(a, b);
        let snap = acc.snapshot().await;
        assert_eq!(snap.tool_usage["search"].calls, 2);
        assert_eq!(snap.tool_usage["search"].errors, 1);
    }

    #[tokio::test]
    async fn tracks_followups_and_senso_flags() {
        let acc = MetricAccumulator::new();
        acc.add_followups(3).await;
        acc.mark_senso_search_used().await;
        let snap = acc.snapshot().await;
        assert_eq!(snap.followup_count, 3);
        assert!(snap.senso_search_used);
        assert!(!snap.senso_generate_used);
    }
}
