//! HTTP-backed tool adapters for the external collaborators spec.md §1
//! deliberately keeps out of scope (LLM SDK, web search/scrapers, vector
//! store): each is a thin `reqwest` client posting JSON to a configured base
//! URL, following `adapters::embeddings::openai::OpenAiEmbeddingProvider`'s
//! config-struct-plus-client shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::error::ToolError;
use crate::domain::models::SearchDepth;
use crate::domain::ports::{
    EvaluateInput, EvaluateTool, EvaluateVerdict, EvaluationCriteria, ExtractOutcome, ExtractTool, LlmPlanner,
    RetrievedChunk, SearchHit, SearchParams, SearchTool, SynthesisInput, VectorStore,
};

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn request_failed(tool: &str, err: reqwest::Error) -> ToolError {
    ToolError::RemoteFailure { tool: tool.to_string(), message: err.to_string() }
}

fn bad_status(tool: &str, status: reqwest::StatusCode) -> ToolError {
    ToolError::RemoteFailure { tool: tool.to_string(), message: format!("unexpected status {status}") }
}

/// Calls a search provider's HTTP endpoint (`POST {base_url}/search`).
pub struct HttpSearchTool {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSearchTool {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { base_url: base_url.into(), client: build_client(timeout_secs) }
    }
}

#[derive(Serialize)]
struct SearchRequestBody<'a> {
    query: &'a str,
    result_count: u32,
    summary_char_budget: u32,
    time_window: String,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: Vec<SearchHitWire>,
}

struct SearchHitWire(SearchHit);

impl<'de> serde::Deserialize<'de> for SearchHitWire {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            title: String,
            url: String,
            content_preview: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self(SearchHit { title: raw.title, url: raw.url, content_preview: raw.content_preview }))
    }
}

#[async_trait]
impl SearchTool for HttpSearchTool {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>, ToolError> {
        let body = SearchRequestBody {
            query: &params.query,
            result_count: params.result_count,
            summary_char_budget: params.summary_char_budget,
            time_window: params.time_window.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("search", e))?;

        if !response.status().is_success() {
            return Err(bad_status("search", response.status()));
        }

        let parsed: SearchResponseBody =
            response.json().await.map_err(|e| request_failed("search", e))?;
        Ok(parsed.hits.into_iter().map(|w| w.0).collect())
    }
}

/// Calls an evaluator's HTTP endpoint (`POST {base_url}/evaluate`).
pub struct HttpEvaluateTool {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEvaluateTool {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { base_url: base_url.into(), client: build_client(timeout_secs) }
    }
}

#[derive(Serialize)]
struct EvaluateRequestBody<'a> {
    query: &'a str,
    criteria: &'static str,
    batch: &'a [EvaluateInput],
}

#[derive(Deserialize)]
struct EvaluateResponseBody {
    verdicts: Vec<EvaluateVerdict>,
}

impl serde::Serialize for EvaluateInput {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("EvaluateInput", 3)?;
        s.serialize_field("title", &self.title)?;
        s.serialize_field("url", &self.url)?;
        s.serialize_field("content_preview", &self.content_preview)?;
        s.end()
    }
}

impl serde::Serialize for EvaluateVerdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("EvaluateVerdict", 3)?;
        s.serialize_field("url", &self.url)?;
        s.serialize_field("is_relevant", &self.is_relevant)?;
        s.serialize_field("reason", &self.reason)?;
        s.end()
    }
}

impl<'de> serde::Deserialize<'de> for EvaluateVerdict {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            url: String,
            is_relevant: bool,
            reason: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self { url: raw.url, is_relevant: raw.is_relevant, reason: raw.reason })
    }
}

#[async_trait]
impl EvaluateTool for HttpEvaluateTool {
    async fn evaluate(
        &self,
        query: &str,
        criteria: EvaluationCriteria,
        batch: &[EvaluateInput],
    ) -> Result<Vec<EvaluateVerdict>, ToolError> {
        let criteria_str = match criteria {
            EvaluationCriteria::Selective => "selective",
            EvaluationCriteria::Balanced => "balanced",
            EvaluationCriteria::Inclusive => "inclusive",
        };
        let body = EvaluateRequestBody { query, criteria: criteria_str, batch };

        let response = self
            .client
            .post(format!("{}/evaluate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("evaluate", e))?;

        if !response.status().is_success() {
            return Err(bad_status("evaluate", response.status()));
        }

        let parsed: EvaluateResponseBody =
            response.json().await.map_err(|e| request_failed("evaluate", e))?;
        Ok(parsed.verdicts)
    }
}

/// Calls an extractor's HTTP endpoint (`POST {base_url}/extract`).
pub struct HttpExtractTool {
    base_url: String,
    client: reqwest::Client,
}

impl HttpExtractTool {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { base_url: base_url.into(), client: build_client(timeout_secs) }
    }
}

#[derive(Serialize)]
struct ExtractRequestBody<'a> {
    query: &'a str,
    url: &'a str,
    title: &'a str,
    content_preview: &'a str,
    followups_per_result: u32,
}

#[derive(Deserialize)]
struct ExtractResponseBody {
    learning: String,
    #[serde(default)]
    follow_up_questions: Vec<String>,
}

#[async_trait]
impl ExtractTool for HttpExtractTool {
    async fn extract(&self, query: &str, hit: &SearchHit, followups_per_result: u32) -> Result<ExtractOutcome, ToolError> {
        let body = ExtractRequestBody {
            query,
            url: &hit.url,
            title: &hit.title,
            content_preview: &hit.content_preview,
            followups_per_result,
        };

        let response = self
            .client
            .post(format!("{}/extract", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("extract", e))?;

        if !response.status().is_success() {
            return Err(bad_status("extract", response.status()));
        }

        let parsed: ExtractResponseBody =
            response.json().await.map_err(|e| request_failed("extract", e))?;
        Ok(ExtractOutcome { url: hit.url.clone(), learning: parsed.learning, follow_up_questions: parsed.follow_up_questions })
    }
}

/// Calls a vector/graph-RAG store's HTTP endpoint (`{base_url}/query`,
/// `{base_url}/upsert`) — the `sensoQuery`/`sensoUpsert` capability pair.
pub struct HttpVectorStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { base_url: base_url.into(), client: build_client(timeout_secs) }
    }
}

#[derive(Serialize)]
struct VectorQueryBody<'a> {
    topic_id: &'a str,
    query: &'a str,
}

#[derive(Deserialize)]
struct VectorQueryResponse {
    chunks: Vec<RetrievedChunk>,
}

impl serde::Serialize for RetrievedChunk {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("RetrievedChunk", 3)?;
        s.serialize_field("content", &self.content)?;
        s.serialize_field("relevance", &self.relevance)?;
        s.serialize_field("source_url", &self.source_url)?;
        s.end()
    }
}

impl<'de> serde::Deserialize<'de> for RetrievedChunk {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            content: String,
            relevance: f64,
            #[serde(default)]
            source_url: Option<String>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self { content: raw.content, relevance: raw.relevance, source_url: raw.source_url })
    }
}

#[derive(Serialize)]
struct VectorUpsertBody<'a> {
    topic_id: &'a str,
    content: &'a str,
    source_url: Option<&'a str>,
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn query(&self, topic_id: &str, query: &str, relevance_cutoff: f64) -> Result<Vec<RetrievedChunk>, ToolError> {
        let body = VectorQueryBody { topic_id, query };
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("sensoQuery", e))?;

        if !response.status().is_success() {
            return Err(bad_status("sensoQuery", response.status()));
        }

        let parsed: VectorQueryResponse =
            response.json().await.map_err(|e| request_failed("sensoQuery", e))?;
        Ok(parsed.chunks.into_iter().filter(|c| c.relevance >= relevance_cutoff).collect())
    }

    async fn upsert(&self, topic_id: &str, content: &str, source_url: Option<&str>) -> Result<(), ToolError> {
        let body = VectorUpsertBody { topic_id, content, source_url };
        let response = self
            .client
            .post(format!("{}/upsert", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("sensoUpsert", e))?;

        if !response.status().is_success() {
            return Err(bad_status("sensoUpsert", response.status()));
        }
        Ok(())
    }
}

/// Calls the LLM provider's HTTP endpoint for reformulation and synthesis.
pub struct HttpLlmPlanner {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmPlanner {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self { base_url: base_url.into(), model: model.into(), client: build_client(timeout_secs) }
    }
}

#[derive(Serialize)]
struct ReformulateBody<'a> {
    query: &'a str,
    count: u32,
    model: &'a str,
}

#[derive(Deserialize)]
struct ReformulateResponse {
    reformulations: Vec<String>,
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    original_query: &'a str,
    queries_issued: &'a [String],
    relevant_urls: &'a [String],
    learnings: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    markdown: String,
}

#[async_trait]
impl LlmPlanner for HttpLlmPlanner {
    async fn reformulate(&self, query: &str, search_depth: SearchDepth) -> Result<Vec<String>, ToolError> {
        let body = ReformulateBody { query, count: search_depth.reformulation_count(), model: &self.model };
        let response = self
            .client
            .post(format!("{}/reformulate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("reformulate", e))?;

        if !response.status().is_success() {
            return Err(bad_status("reformulate", response.status()));
        }

        let parsed: ReformulateResponse =
            response.json().await.map_err(|e| request_failed("reformulate", e))?;
        Ok(parsed.reformulations)
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<String, ToolError> {
        let body = SynthesizeBody {
            original_query: &input.original_query,
            queries_issued: &input.queries_issued,
            relevant_urls: &input.relevant_urls,
            learnings: &input.learnings,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("synthesize", e))?;

        if !response.status().is_success() {
            return Err(bad_status("synthesize", response.status()));
        }

        let parsed: SynthesizeResponse =
            response.json().await.map_err(|e| request_failed("synthesize", e))?;
        Ok(parsed.markdown)
    }
}
