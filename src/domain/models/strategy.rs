//! Strategy: a versioned configuration that fully determines how the research
//! pipeline executes for a topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a strategy version.
///
/// Invariant (enforced by the strategy store, not this type): at most one
/// strategy per topic has `Active` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Active,
    Candidate,
    Archived,
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Candidate => write!(f, "candidate"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "candidate" => Ok(Self::Candidate),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown strategy status: {other}")),
        }
    }
}

/// Search depth, the single config knob that fans out into result count,
/// summary size, evaluator criteria, and default follow-up budget (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Shallow,
    Standard,
    Deep,
}

impl SearchDepth {
    pub const fn result_count(self) -> u32 {
        match self {
            Self::Shallow => 2,
            Self::Standard => 3,
            Self::Deep => 5,
        }
    }

    pub const fn summary_char_budget(self) -> u32 {
        match self {
            Self::Shallow => 4_000,
            Self::Standard => 8_000,
            Self::Deep => 12_000,
        }
    }

    pub const fn evaluator_criteria(self) -> &'static str {
        match self {
            Self::Shallow => "selective",
            Self::Standard => "balanced",
            Self::Deep => "inclusive",
        }
    }

    pub const fn default_followups_per_result(self) -> u32 {
        match self {
            Self::Shallow => 0,
            Self::Standard => 1,
            Self::Deep => 2,
        }
    }

    /// Number of query reformulations phase 1 issues for this depth (spec
    /// §4.3, "2-3 query reformulations ... count is derived from
    /// searchDepth").
    pub const fn reformulation_count(self) -> u32 {
        match self {
            Self::Shallow | Self::Standard => 2,
            Self::Deep => 3,
        }
    }
}

impl std::fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shallow => write!(f, "shallow"),
            Self::Standard => write!(f, "standard"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shallow" => Ok(Self::Shallow),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            other => Err(format!("unknown search depth: {other}")),
        }
    }
}

/// Temporal scope hint passed through to the search tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    All,
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(format!("unknown time window: {other}")),
        }
    }
}

/// A single pipeline tool selectable via `StrategyConfig::tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Search,
    Evaluate,
    Extract,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Evaluate => write!(f, "evaluate"),
            Self::Extract => write!(f, "extract"),
        }
    }
}

/// The embedded, fully-owned configuration body of a `Strategy`.
///
/// Every field here is a recognized option with a defined effect (spec §3);
/// unrecognized values are rejected at the strategy store boundary rather
/// than silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub tools: Vec<ToolKind>,
    pub search_depth: SearchDepth,
    pub time_window: TimeWindow,
    pub senso_first: bool,
    pub max_followups: Option<u32>,
    pub parallel_searches: bool,
    pub model: String,
    pub summary_templates: Vec<String>,
}

impl StrategyConfig {
    /// The config a topic's first strategy version is created with (spec §4.1).
    pub fn default_for_new_topic(default_model: impl Into<String>) -> Self {
        Self {
            tools: vec![ToolKind::Search, ToolKind::Evaluate, ToolKind::Extract],
            search_depth: SearchDepth::Standard,
            time_window: TimeWindow::Week,
            senso_first: false,
            max_followups: None,
            parallel_searches: false,
            model: default_model.into(),
            summary_templates: Vec::new(),
        }
    }

    pub fn has_tool(&self, tool: ToolKind) -> bool {
        self.tools.contains(&tool)
    }

    /// Resolves the followups-per-result cap, honoring an explicit
    /// `max_followups` override or falling back to the search-depth default
    /// (spec §4.4, "tool contracts: extract"). An explicit cap never raises
    /// the per-result limit above the depth default, only lowers it.
    pub fn followups_per_result(&self) -> u32 {
        let depth_default = self.search_depth.default_followups_per_result();
        match self.max_followups {
            Some(cap) => depth_default.min(cap),
            None => depth_default,
        }
    }

    /// The hard cap on follow-up questions accumulated across all extract
    /// calls in an episode (spec §3, `maxFollowups`). When unset, derived
    /// from `searchDepth` as the per-result default times the result count
    /// for that depth, so deeper strategies tolerate proportionally more
    /// follow-ups before phase 2 is starved.
    pub fn effective_max_followups(&self) -> u32 {
        self.max_followups.unwrap_or_else(|| {
            self.search_depth.default_followups_per_result() * self.search_depth.result_count()
        })
    }
}

/// A versioned configuration for a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub topic_id: Uuid,
    pub version: i64,
    pub status: StrategyStatus,
    pub rollout_percentage: u8,
    pub parent_version: Option<i64>,
    pub config: StrategyConfig,
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    pub fn is_active(&self) -> bool {
        self.status == StrategyStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_depth_derives_result_count_and_budget() {
        assert_eq!(SearchDepth::Shallow.result_count(), 2);
        assert_eq!(SearchDepth::Standard.result_count(), 3);
        assert_eq!(SearchDepth::Deep.result_count(), 5);
        assert_eq!(SearchDepth::Deep.summary_char_budget(), 12_000);
        assert_eq!(SearchDepth::Shallow.default_followups_per_result(), 0);
    }

    #[test]
    fn default_config_matches_spec() {
        let config = StrategyConfig::default_for_new_topic("claude-default");
        assert_eq!(config.tools.len(), 3);
        assert_eq!(config.search_depth, SearchDepth::Standard);
        assert_eq!(config.time_window, TimeWindow::Week);
        assert!(!config.senso_first);
        assert!(config.max_followups.is_none());
        assert!(!config.parallel_searches);
    }

    #[test]
    fn followups_per_result_falls_back_to_depth_default() {
        let mut config = StrategyConfig::default_for_new_topic("m");
        config.search_depth = SearchDepth::Deep;
        assert_eq!(config.followups_per_result(), 2);
        config.max_followups = Some(0);
        assert_eq!(config.followups_per_result(), 0);
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!("active".parse::<StrategyStatus>().unwrap(), StrategyStatus::Active);
        assert!("bogus".parse::<StrategyStatus>().is_err());
    }
}
