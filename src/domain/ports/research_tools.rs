use async_trait::async_trait;

use crate::domain::error::ToolError;
use crate::domain::models::{SearchDepth, TimeWindow};

/// One item returned by a search call, before evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content_preview: String,
}

/// Parameters derived from `StrategyConfig` for a single search call
/// (spec §4.4, "search").
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub result_count: u32,
    pub summary_char_budget: u32,
    pub time_window: TimeWindow,
}

/// The tool that turns a query reformulation into a set of candidate sources.
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>, ToolError>;
}

/// One batch input to the evaluator: a candidate source plus whether it has
/// already been seen this episode (deduplicated by URL before evaluation).
#[derive(Debug, Clone)]
pub struct EvaluateInput {
    pub title: String,
    pub url: String,
    pub content_preview: String,
}

/// Relevance verdict for one evaluated source, returned in the same order as
/// the input batch (spec §4.4, "evaluate").
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateVerdict {
    pub url: String,
    pub is_relevant: bool,
    pub reason: String,
}

/// Criteria preset derived from `searchDepth`, controlling how strict the
/// evaluator's relevance scoring is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationCriteria {
    Selective,
    Balanced,
    Inclusive,
}

impl From<SearchDepth> for EvaluationCriteria {
    fn from(depth: SearchDepth) -> Self {
        match depth {
            SearchDepth::Shallow => Self::Selective,
            SearchDepth::Standard => Self::Balanced,
            SearchDepth::Deep => Self::Inclusive,
        }
    }
}

/// The tool that scores a batch of candidate sources against the user query.
#[async_trait]
pub trait EvaluateTool: Send + Sync {
    async fn evaluate(
        &self,
        query: &str,
        criteria: EvaluationCriteria,
        batch: &[EvaluateInput],
    ) -> Result<Vec<EvaluateVerdict>, ToolError>;
}

/// A single extraction result: the synthesized learning from one relevant
/// source, plus the follow-up questions it suggests (spec §4.4, "extract").
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOutcome {
    pub url: String,
    pub learning: String,
    pub follow_up_questions: Vec<String>,
}

/// The tool that distills a relevant source into a learning and follow-ups.
#[async_trait]
pub trait ExtractTool: Send + Sync {
    async fn extract(
        &self,
        query: &str,
        hit: &SearchHit,
        followups_per_result: u32,
    ) -> Result<ExtractOutcome, ToolError>;
}
