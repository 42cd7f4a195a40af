//! Tool Contracts Layer (spec §4.4): wraps every external tool call so it
//! reads the ambient `EpisodeContext`, derives its parameters from the
//! active strategy, enforces a timeout and cancellation check, records
//! metrics, and emits `tool_call`/`tool_result` events — mirroring how
//! `domain::ports::substrate::Substrate` lets the swarm orchestrator dispatch
//! over interchangeable backends without each call site repeating the
//! bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use uuid::Uuid;

use crate::domain::error::ToolError;
use crate::domain::models::{SearchDepth, TimeWindow};
use crate::domain::ports::{
    EvaluateInput, EvaluateTool, EvaluateVerdict, EvaluationCriteria, ExtractOutcome, ExtractTool, LlmPlanner,
    RetrievedChunk, SearchHit, SearchParams, SearchTool, SynthesisInput, VectorStore,
};
use crate::services::event_bus::EventEmitter;
use crate::services::runtime_context::EpisodeContext;

/// Per-tool call timeouts (spec §4.4 point 3, default 30s, configurable).
#[derive(Debug, Clone)]
pub struct ToolTimeouts {
    pub search: Duration,
    pub evaluate: Duration,
    pub extract: Duration,
    pub vector_store: Duration,
    pub planner: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        let default = Duration::from_secs(30);
        Self { search: default, evaluate: default, extract: default, vector_store: default, planner: default }
    }
}

/// Aggregates the external collaborators behind one ambient wrapper. The
/// state machine only ever talks to this, never to a raw port.
pub struct ToolContracts {
    search_tool: Arc<dyn SearchTool>,
    evaluate_tool: Arc<dyn EvaluateTool>,
    extract_tool: Arc<dyn ExtractTool>,
    vector_store: Arc<dyn VectorStore>,
    llm_planner: Arc<dyn LlmPlanner>,
    timeouts: ToolTimeouts,
}

impl ToolContracts {
    pub fn new(
        search_tool: Arc<dyn SearchTool>,
        evaluate_tool: Arc<dyn EvaluateTool>,
        extract_tool: Arc<dyn ExtractTool>,
        vector_store: Arc<dyn VectorStore>,
        llm_planner: Arc<dyn LlmPlanner>,
        timeouts: ToolTimeouts,
    ) -> Self {
        Self { search_tool, evaluate_tool, extract_tool, vector_store, llm_planner, timeouts }
    }

    fn check_cancelled(ctx: &EpisodeContext, tool: &str) -> Result<(), ToolError> {
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled(tool.to_string()));
        }
        Ok(())
    }

    async fn with_timeout<T>(
        timeout: Duration,
        tool: &str,
        fut: impl std::future::Future<Output = Result<T, ToolError>>,
    ) -> Result<T, ToolError> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(tool.to_string())),
        }
    }

    /// `search` (spec §4.4.2): derives `resultCount`/`summaryCharBudget` from
    /// `searchDepth`, passes `timeWindow` through, increments
    /// `toolUsage.search`.
    pub async fn search(
        &self,
        ctx: &EpisodeContext,
        emitter: &EventEmitter,
        query: &str,
    ) -> Result<Vec<SearchHit>, ToolError> {
        use crate::services::event_bus::CoreEvent;

        Self::check_cancelled(ctx, "search")?;
        let depth: SearchDepth = ctx.config.search_depth;
        let params = SearchParams {
            query: query.to_string(),
            result_count: depth.result_count(),
            summary_char_budget: depth.summary_char_budget(),
            time_window: ctx.config.time_window,
        };

        emitter
            .emit(CoreEvent::ToolCall {
                tool: "search".to_string(),
                args: json!({ "query": params.query, "resultCount": params.result_count, "timeWindow": time_window_str(params.time_window) }),
            })
            .await;

        let started = Instant::now();
        let result = Self::with_timeout(self.timeouts.search, "search", self.search_tool.search(&params)).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_tool_call("search", latency_ms, result.is_err()).await;

        match &result {
            Ok(hits) => {
                emitter
                    .emit(CoreEvent::ToolResult {
                        tool: "search".to_string(),
                        result: format!("{} results", hits.len()),
                        details: None,
                    })
                    .await;
                emitter
                    .emit(CoreEvent::SearchResults {
                        query: query.to_string(),
                        count: hits.len() as u32,
                        urls: hits.iter().map(|h| h.url.clone()).collect(),
                    })
                    .await;
            }
            Err(err) => {
                emitter
                    .emit(CoreEvent::ToolResult { tool: "search".to_string(), result: format!("error: {err}"), details: Some(json!({"error": true})) })
                    .await;
            }
        }

        result
    }

    /// `evaluate` (spec §4.4.2): criteria preset by depth, batch input
    /// deduplicated by the caller (state machine) before this is invoked.
    pub async fn evaluate(
        &self,
        ctx: &EpisodeContext,
        emitter: &EventEmitter,
        query: &str,
        batch: &[EvaluateInput],
    ) -> Result<Vec<EvaluateVerdict>, ToolError> {
        use crate::services::event_bus::CoreEvent;

        Self::check_cancelled(ctx, "evaluate")?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let criteria: EvaluationCriteria = ctx.config.search_depth.into();

        emitter
            .emit(CoreEvent::ToolCall { tool: "evaluate".to_string(), args: json!({ "batchSize": batch.len() }) })
            .await;

        let started = Instant::now();
        let result =
            Self::with_timeout(self.timeouts.evaluate, "evaluate", self.evaluate_tool.evaluate(query, criteria, batch)).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_tool_call("evaluate", latency_ms, result.is_err()).await;

        match &result {
            Ok(verdicts) => {
                emitter
                    .emit(CoreEvent::ToolResult { tool: "evaluate".to_string(), result: format!("{} evaluated", verdicts.len()), details: None })
                    .await;
                emitter
                    .emit(CoreEvent::EvaluationResults {
                        evaluated: verdicts.len() as u32,
                        relevant: verdicts.iter().filter(|v| v.is_relevant).count() as u32,
                        results: verdicts
                            .iter()
                            .map(|v| crate::services::event_bus::EvaluationResultWire {
                                url: v.url.clone(),
                                is_relevant: v.is_relevant,
                                reason: v.reason.clone(),
                            })
                            .collect(),
                    })
                    .await;
            }
            Err(err) => {
                emitter
                    .emit(CoreEvent::ToolResult { tool: "evaluate".to_string(), result: format!("error: {err}"), details: Some(json!({"error": true})) })
                    .await;
            }
        }

        result
    }

    /// `extract` (spec §4.4.2): followups-per-result capped by
    /// `StrategyConfig::followups_per_result`.
    pub async fn extract(
        &self,
        ctx: &EpisodeContext,
        emitter: &EventEmitter,
        query: &str,
        hit: &SearchHit,
    ) -> Result<ExtractOutcome, ToolError> {
        use crate::services::event_bus::CoreEvent;

        Self::check_cancelled(ctx, "extract")?;
        let followups_per_result = ctx.config.followups_per_result();

        emitter
            .emit(CoreEvent::ToolCall { tool: "extract".to_string(), args: json!({ "url": hit.url }) })
            .await;

        let started = Instant::now();
        let result = Self::with_timeout(
            self.timeouts.extract,
            "extract",
            self.extract_tool.extract(query, hit, followups_per_result),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_tool_call("extract", latency_ms, result.is_err()).await;

        match &result {
            Ok(outcome) => {
                emitter
                    .emit(CoreEvent::ToolResult { tool: "extract".to_string(), result: "learning extracted".to_string(), details: None })
                    .await;
                emitter
                    .emit(CoreEvent::LearningExtracted {
                        learning: outcome.learning.clone(),
                        follow_up_questions: outcome.follow_up_questions.clone(),
                    })
                    .await;
            }
            Err(err) => {
                emitter
                    .emit(CoreEvent::ToolResult { tool: "extract".to_string(), result: format!("error: {err}"), details: Some(json!({"error": true})) })
                    .await;
            }
        }

        result
    }

    /// `sensoQuery`: vector-store lookup, used both by the optional
    /// `SENSO_LOOKUP` state and the synthesize step's extra retrieval.
    pub async fn senso_query(
        &self,
        ctx: &EpisodeContext,
        emitter: &EventEmitter,
        query: &str,
        relevance_cutoff: f64,
    ) -> Result<Vec<RetrievedChunk>, ToolError> {
        use crate::services::event_bus::CoreEvent;

        Self::check_cancelled(ctx, "sensoQuery")?;
        emitter.emit(CoreEvent::ToolCall { tool: "sensoQuery".to_string(), args: json!({ "query": query }) }).await;

        let started = Instant::now();
        let result = Self::with_timeout(
            self.timeouts.vector_store,
            "sensoQuery",
            self.vector_store.query(&ctx.topic_id.to_string(), query, relevance_cutoff),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_tool_call("sensoQuery", latency_ms, result.is_err()).await;

        emitter
            .emit(CoreEvent::ToolResult {
                tool: "sensoQuery".to_string(),
                result: match &result {
                    Ok(chunks) => format!("{} chunks", chunks.len()),
                    Err(err) => format!("error: {err}"),
                },
                details: None,
            })
            .await;

        result
    }

    /// `sensoUpsert`: stores newly synthesized content back into the vector
    /// store. Not currently invoked by the state machine (the spec's
    /// upsert path is external-ingestion-driven), but wired through so a
    /// future caller doesn't need to re-derive the ambient plumbing.
    pub async fn senso_upsert(
        &self,
        ctx: &EpisodeContext,
        content: &str,
        source_url: Option<&str>,
    ) -> Result<(), ToolError> {
        Self::check_cancelled(ctx, "sensoUpsert")?;
        let started = Instant::now();
        let result =
            Self::with_timeout(self.timeouts.vector_store, "sensoUpsert", self.vector_store.upsert(&ctx.topic_id.to_string(), content, source_url))
                .await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_tool_call("sensoUpsert", latency_ms, result.is_err()).await;
        result
    }

    pub async fn reformulate(&self, ctx: &EpisodeContext, query: &str) -> Result<Vec<String>, ToolError> {
        Self::check_cancelled(ctx, "planner")?;
        Self::with_timeout(self.timeouts.planner, "planner", self.llm_planner.reformulate(query, ctx.config.search_depth)).await
    }

    pub async fn synthesize(&self, ctx: &EpisodeContext, input: &SynthesisInput) -> Result<String, ToolError> {
        Self::check_cancelled(ctx, "synthesize")?;
        Self::with_timeout(self.timeouts.planner, "synthesize", self.llm_planner.synthesize(input)).await
    }

    pub fn episode_id_tag(&self, episode_id: Uuid) -> String {
        episode_id.to_string()
    }
}

const fn time_window_str(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Day => "day",
        TimeWindow::Week => "week",
        TimeWindow::Month => "month",
        TimeWindow::All => "all",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::models::StrategyConfig;
    use crate::domain::ports::*;

    struct StubSearch;
    #[async_trait]
    impl SearchTool for StubSearch {
        async fn search(&self, params: &SearchParams) -> Result<Vec<SearchHit>, ToolError> {
            Ok(vec![SearchHit { title: "t".into(), url: format!("https://x/{}", params.query), content_preview: "c".into() }])
        }
    }

    struct StubEvaluate;
    #[async_trait]
    impl EvaluateTool for StubEvaluate {
        async fn evaluate(&self, _query: &str, _criteria: EvaluationCriteria, batch: &[EvaluateInput]) -> Result<Vec<EvaluateVerdict>, ToolError> {
            Ok(batch.iter().map(|b| EvaluateVerdict { url: b.url.clone(), is_relevant: true, reason: "ok".into() }).collect())
        }
    }

    struct StubExtract;
    #[async_trait]
    impl ExtractTool for StubExtract {
        async fn extract(&self, _query: &str, hit: &SearchHit, _followups: u32) -> Result<ExtractOutcome, ToolError> {
            Ok(ExtractOutcome { url: hit.url.clone(), learning: "learned".into(), follow_up_questions: vec![] })
        }
    }

    struct StubVector;
    #[async_trait]
    impl VectorStore for StubVector {
        async fn query(&self, _topic_id: &str, _query: &str, _cutoff: f64) -> Result<Vec<RetrievedChunk>, ToolError> {
            Ok(vec![])
        }
        async fn upsert(&self, _topic_id: &str, _content: &str, _source_url: Option<&str>) -> Result<(), ToolError> {
            Ok(())
        }
    }

    struct StubPlanner;
    #[async_trait]
    impl LlmPlanner for StubPlanner {
        async fn reformulate(&self, query: &str, depth: crate::domain::models::SearchDepth) -> Result<Vec<String>, ToolError> {
            Ok((0..depth.reformulation_count()).map(|i| format!("{query}-{i}")).collect())
        }
        async fn synthesize(&self, _input: &SynthesisInput) -> Result<String, ToolError> {
            Ok("# synthesized".to_string())
        }
    }

    fn contracts() -> ToolContracts {
        ToolContracts::new(
            Arc::new(StubSearch),
            Arc::new(StubEvaluate),
            Arc::new(StubExtract),
            Arc::new(StubVector),
            Arc::new(StubPlanner),
            ToolTimeouts::default(),
        )
    }

    #[tokio::test]
    async fn search_records_metrics_and_emits_events() {
        let contracts = contracts();
        let ctx = EpisodeContext::new(Uuid::new_v4(), Uuid::new_v4(), 1, Arc::new(StrategyConfig::default_for_new_topic("m")));
        let bus = crate::services::event_bus::EventBus::new();
        let (emitter, mut rx) = bus.register(ctx.episode_id);

        let hits = contracts.search(&ctx, &emitter, "quantum").await.unwrap();
        assert_eq!(hits.len(), 1);
        let snap = ctx.metrics.snapshot().await;
        assert_eq!(snap.tool_usage["search"].calls, 1);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, crate::services::event_bus::CoreEvent::ToolCall { .. }));
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits_before_dispatch() {
        let contracts = contracts();
        let ctx = EpisodeContext::new(Uuid::new_v4(), Uuid::new_v4(), 1, Arc::new(StrategyConfig::default_for_new_topic("m")));
        ctx.cancel();
        let bus = crate::services::event_bus::EventBus::new();
        let (emitter, _rx) = bus.register(ctx.episode_id);

        let result = contracts.search(&ctx, &emitter, "quantum").await;
        assert!(matches!(result, Err(ToolError::Cancelled(_))));
    }
}
