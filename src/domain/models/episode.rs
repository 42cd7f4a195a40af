//! Episode: one research query executed under a specific strategy version.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown episode status: {other}")),
        }
    }
}

/// Per-tool invocation counters accumulated over an episode's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub calls: u32,
    pub errors: u32,
    pub total_latency_ms: u64,
}

impl ToolUsage {
    pub fn record_call(&mut self, latency_ms: u64, errored: bool) {
        self.calls += 1;
        self.total_latency_ms += latency_ms;
        if errored {
            self.errors += 1;
        }
    }
}

/// One research query run end-to-end under a strategy version.
///
/// `tool_usage` is keyed by tool name (`"search"`, `"evaluate"`, `"extract"`,
/// `"sensoQuery"`, `"sensoUpsert"`) rather than `ToolKind` so that Senso calls,
/// which are not part of `StrategyConfig::tools`, are tracked alongside the
/// pipeline tools without widening that enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub user_id: Option<String>,
    pub strategy_version: i64,
    pub query: String,
    pub status: EpisodeStatus,
    pub error_message: Option<String>,
    pub sources_returned: u32,
    pub sources_saved: u32,
    pub tool_usage: HashMap<String, ToolUsage>,
    pub followup_count: u32,
    pub senso_search_used: bool,
    pub senso_generate_used: bool,
    pub result_note_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(topic_id: Uuid, strategy_version: i64, query: String, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic_id,
            user_id,
            strategy_version,
            query,
            status: EpisodeStatus::Pending,
            error_message: None,
            sources_returned: 0,
            sources_saved: 0,
            tool_usage: HashMap::new(),
            followup_count: 0,
            senso_search_used: false,
            senso_generate_used: false,
            result_note_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn start(&mut self) {
        self.status = EpisodeStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, result_note_id: Uuid) {
        self.status = EpisodeStatus::Completed;
        self.result_note_id = Some(result_note_id);
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.status = EpisodeStatus::Failed;
        self.error_message = Some(error_message.into());
        self.updated_at = Utc::now();
    }

    pub fn record_tool_call(&mut self, tool_name: &str, latency_ms: u64, errored: bool) {
        self.tool_usage
            .entry(tool_name.to_string())
            .or_default()
            .record_call(latency_ms, errored);
        self.updated_at = Utc::now();
    }

    /// Fraction of returned sources that were ultimately saved as learnings,
    /// the `saveRate` derived metric from spec §3. `None` when no sources were
    /// returned, to avoid a misleading 0.0 that looks identical to "all
    /// discarded".
    pub fn save_rate(&self) -> Option<f64> {
        if self.sources_returned == 0 {
            None
        } else {
            Some(f64::from(self.sources_saved) / f64::from(self.sources_returned))
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EpisodeStatus::Completed | EpisodeStatus::Failed)
    }

    /// `saveRate` exactly as defined in spec §3:
    /// `mean(|sourcesSaved| / max(|sourcesReturned|, 1))`. Unlike
    /// [`Episode::save_rate`], this never returns `None`: an episode with no
    /// returned sources contributes `0.0`, which is what the evolution
    /// analyzer's aggregate mean expects.
    pub fn raw_save_rate(&self) -> f64 {
        f64::from(self.sources_saved) / f64::from(self.sources_returned.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_episode_starts_pending_with_no_usage() {
        let episode = Episode::new(Uuid::new_v4(), 1, "quantum annealing".to_string(), None);
        assert_eq!(episode.status, EpisodeStatus::Pending);
        assert!(episode.tool_usage.is_empty());
        assert!(episode.save_rate().is_none());
    }

    #[test]
    fn save_rate_divides_saved_by_returned() {
        let mut episode = Episode::new(Uuid::new_v4(), 1, "q".to_string(), None);
        episode.sources_returned = 4;
        episode.sources_saved = 1;
        assert!((episode.save_rate().unwrap() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn complete_sets_result_note_and_terminal_status() {
        let mut episode = Episode::new(Uuid::new_v4(), 1, "q".to_string(), None);
        let note_id = Uuid::new_v4();
        episode.complete(note_id);
        assert!(episode.is_terminal());
        assert_eq!(episode.result_note_id, Some(note_id));
    }

    #[test]
    fn tool_usage_accumulates_calls_and_errors() {
        let mut episode = Episode::new(Uuid::new_v4(), 1, "q".to_string(), None);
        episode.record_tool_call("search", 120, false);
        episode.record_tool_call("search", 80, true);
        let usage = &episode.tool_usage["search"];
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.errors, 1);
        assert_eq!(usage.total_latency_ms, 200);
    }
}
