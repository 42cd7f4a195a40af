//! In-process mock tool adapters, grounded in
//! `adapters::substrates::mock::MockSubstrate`'s pattern: a default canned
//! response plus per-key overrides, so integration tests can script exact
//! pipeline behavior (spec §8's seed scenarios) without a real LLM or search
//! provider.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::ToolError;
use crate::domain::models::SearchDepth;
use crate::domain::ports::{
    EvaluateInput, EvaluateTool, EvaluateVerdict, EvaluationCriteria, ExtractOutcome, ExtractTool, LlmPlanner,
    RetrievedChunk, SearchHit, SearchParams, SearchTool, SynthesisInput, VectorStore,
};

/// Scripted search results keyed by the reformulated query text.
#[derive(Default)]
pub struct MockSearchTool {
    responses: Mutex<HashMap<String, Result<Vec<SearchHit>, ToolError>>>,
    default_response: Mutex<Vec<SearchHit>>,
}

impl MockSearchTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, query: impl Into<String>, hits: Vec<SearchHit>) {
        self.responses.lock().expect("poisoned").insert(query.into(), Ok(hits));
    }

    pub fn script_failure(&self, query: impl Into<String>, error: ToolError) {
        self.responses.lock().expect("poisoned").insert(query.into(), Err(error));
    }

    pub fn set_default(&self, hits: Vec<SearchHit>) {
        *self.default_response.lock().expect("poisoned") = hits;
    }
}

#[async_trait]
impl SearchTool for MockSearchTool {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>, ToolError> {
        let responses = self.responses.lock().expect("poisoned");
        match responses.get(&params.query) {
            Some(result) => result.clone(),
            None => Ok(self.default_response.lock().expect("poisoned").clone()),
        }
    }
}

/// Evaluates every candidate as relevant unless scripted otherwise, keyed by URL.
#[derive(Default)]
pub struct MockEvaluateTool {
    relevance: Mutex<HashMap<String, bool>>,
    fail: Mutex<bool>,
}

impl MockEvaluateTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_relevant(&self, url: impl Into<String>, is_relevant: bool) {
        self.relevance.lock().expect("poisoned").insert(url.into(), is_relevant);
    }

    pub fn fail_next(&self) {
        *self.fail.lock().expect("poisoned") = true;
    }
}

#[async_trait]
impl EvaluateTool for MockEvaluateTool {
    async fn evaluate(
        &self,
        _query: &str,
        _criteria: EvaluationCriteria,
        batch: &[EvaluateInput],
    ) -> Result<Vec<EvaluateVerdict>, ToolError> {
        if std::mem::take(&mut *self.fail.lock().expect("poisoned")) {
            return Err(ToolError::RemoteFailure { tool: "evaluate".to_string(), message: "mock failure".to_string() });
        }

        let relevance = self.relevance.lock().expect("poisoned");
        Ok(batch
            .iter()
            .map(|input| {
                let is_relevant = relevance.get(&input.url).copied().unwrap_or(true);
                EvaluateVerdict {
                    url: input.url.clone(),
                    is_relevant,
                    reason: if is_relevant { "relevant".to_string() } else { "not relevant".to_string() },
                }
            })
            .collect())
    }
}

/// Produces one learning per hit, with scripted follow-ups keyed by URL.
#[derive(Default)]
pub struct MockExtractTool {
    followups: Mutex<HashMap<String, Vec<String>>>,
}

impl MockExtractTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_followups(&self, url: impl Into<String>, followups: Vec<String>) {
        self.followups.lock().expect("poisoned").insert(url.into(), followups);
    }
}

#[async_trait]
impl ExtractTool for MockExtractTool {
    async fn extract(&self, _query: &str, hit: &SearchHit, followups_per_result: u32) -> Result<ExtractOutcome, ToolError> {
        let mut followups = self
            .followups
            .lock()
            .expect("poisoned")
            .get(&hit.url)
            .cloned()
            .unwrap_or_default();
        followups.truncate(followups_per_result as usize);

        Ok(ExtractOutcome {
            url: hit.url.clone(),
            learning: format!("Learning distilled from {}", hit.title),
            follow_up_questions: followups,
        })
    }
}

/// Vector store stub with no retrieved chunks by default (no senso hit).
#[derive(Default)]
pub struct MockVectorStore {
    chunks: Mutex<Vec<RetrievedChunk>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_chunks(&self, chunks: Vec<RetrievedChunk>) {
        *self.chunks.lock().expect("poisoned") = chunks;
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn query(&self, _topic_id: &str, _query: &str, relevance_cutoff: f64) -> Result<Vec<RetrievedChunk>, ToolError> {
        Ok(self
            .chunks
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|c| c.relevance >= relevance_cutoff)
            .cloned()
            .collect())
    }

    async fn upsert(&self, _topic_id: &str, _content: &str, _source_url: Option<&str>) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Deterministic planner: reformulates by appending enumerated suffixes,
/// synthesizes a markdown document citing every relevant URL.
#[derive(Default)]
pub struct MockLlmPlanner;

impl MockLlmPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmPlanner for MockLlmPlanner {
    async fn reformulate(&self, query: &str, search_depth: SearchDepth) -> Result<Vec<String>, ToolError> {
        Ok((1..=search_depth.reformulation_count()).map(|i| format!("{query} (variant {i})")).collect())
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<String, ToolError> {
        if input.relevant_urls.is_empty() {
            return Ok(format!(
                "# Research summary: {}\n\nNo external evidence was found.",
                input.original_query
            ));
        }

        let mut markdown = format!("# Research summary: {}\n\n", input.original_query);
        for (learning, url) in input.learnings.iter().zip(input.relevant_urls.iter()) {
            markdown.push_str(&format!("- {learning} ([source]({url}))\n"));
        }
        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_search_returns_scripted_hits_for_exact_query() {
        let tool = MockSearchTool::new();
        tool.script(
            "agent planners",
            vec![SearchHit { title: "A".to_string(), url: "https://a".to_string(), content_preview: "..".to_string() }],
        );

        let params = SearchParams {
            query: "agent planners".to_string(),
            result_count: 3,
            summary_char_budget: 8000,
            time_window: crate::domain::models::TimeWindow::Week,
        };
        let hits = tool.search(&params).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a");
    }

    #[tokio::test]
    async fn mock_evaluate_fails_once_then_recovers() {
        let tool = MockEvaluateTool::new();
        tool.fail_next();
        let batch = vec![EvaluateInput { title: "t".to_string(), url: "u".to_string(), content_preview: "p".to_string() }];
        assert!(tool.evaluate("q", EvaluationCriteria::Balanced, &batch).await.is_err());
        assert!(tool.evaluate("q", EvaluationCriteria::Balanced, &batch).await.is_ok());
    }
}
