use async_trait::async_trait;

use crate::domain::error::ToolError;
use crate::domain::models::SearchDepth;

/// The LLM-backed planning capability: turns a user query into search
/// reformulations (phase 1 entry), and turns accumulated research into a
/// final markdown note (synthesize).
#[async_trait]
pub trait LlmPlanner: Send + Sync {
    /// Produces 2-3 query reformulations, the count derived from
    /// `search_depth` (spec §4.3, "PHASE1_SEARCH issues 2-3 query
    /// reformulations").
    async fn reformulate(&self, query: &str, search_depth: SearchDepth) -> Result<Vec<String>, ToolError>;

    /// Synthesizes the final markdown note from everything accumulated
    /// across both phases.
    async fn synthesize(&self, input: &SynthesisInput) -> Result<String, ToolError>;
}

/// Everything the synthesize step has accumulated by the time it runs
/// (spec §4.3, "its input is the accumulated `{relevantResults, learnings,
/// queries}` plus the original query").
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub original_query: String,
    pub queries_issued: Vec<String>,
    pub relevant_urls: Vec<String>,
    pub learnings: Vec<String>,
}
