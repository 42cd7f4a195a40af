//! Research State Machine (spec §4.3): the two-phase
//! search→evaluate→extract→synthesize loop, with the hard rule that phase 2
//! never spawns a phase 3.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::domain::error::EpisodeError;
use crate::domain::models::ToolKind;
use crate::domain::ports::{EvaluateInput, SearchHit, SynthesisInput};
use crate::services::event_bus::{CoreEvent, EventEmitter};
use crate::services::runtime_context::EpisodeContext;
use crate::services::tool_contracts::ToolContracts;

/// A strong senso hit feeds chunks straight into the phase as if they were
/// search results; this is the cutoff above which a retrieved chunk counts
/// as one (spec §4.3, "strong hit").
const SENSO_RELEVANCE_CUTOFF: f64 = 0.75;

/// Bounded fan-out for `parallelSearches` (spec §4.3, §5).
const MAX_PARALLEL_SEARCHES: usize = 4;

/// One source the episode has seen, whatever phase or path it arrived by.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub content_preview: String,
    pub is_relevant: bool,
    pub reason: String,
    pub learning: Option<String>,
}

/// What the episode runtime needs once the machine reaches `DONE`.
pub struct ResearchOutcome {
    pub markdown: String,
    pub sources_returned: Vec<SourceRecord>,
    pub sources_saved: Vec<SourceRecord>,
    pub queries_issued: Vec<String>,
}

#[derive(Default)]
struct Accumulator {
    seen_urls: HashSet<String>,
    sources: Vec<SourceRecord>,
    learnings: Vec<String>,
    follow_ups: Vec<String>,
    queries_issued: Vec<String>,
    followup_count: u32,
    senso_search_used: bool,
    senso_generate_used: bool,
}

impl Accumulator {
    /// Registers a batch of raw hits, deduplicating by URL against
    /// everything seen so far in the episode (spec §4.3, "Results already
    /// present (by URL) in the current episode's accumulator are marked
    /// not-relevant ... and never re-evaluated"). Returns only the novel
    /// hits, in their original order, that still need evaluation.
    fn register_novel(&mut self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut novel = Vec::with_capacity(hits.len());
        for hit in hits {
            if self.seen_urls.insert(hit.url.clone()) {
                novel.push(hit);
            }
        }
        novel
    }
}

/// Runs the full research pipeline for one episode and returns the
/// synthesized outcome, or an `EpisodeError` on a non-recoverable failure
/// (spec §7: search-all-fail, synthesize failure, cancellation).
pub async fn run(
    ctx: &EpisodeContext,
    emitter: &EventEmitter,
    tools: Arc<ToolContracts>,
    query: &str,
) -> Result<ResearchOutcome, EpisodeError> {
    let mut acc = Accumulator::default();

    if ctx.is_cancelled() {
        return Err(EpisodeError::Cancelled);
    }

    let mut phase1_hits: Vec<SearchHit> = Vec::new();
    let mut skip_phase1_search = false;

    if ctx.config.senso_first {
        emit_progress(emitter, "senso_lookup", 0, 4).await;
        if let Ok(chunks) = tools.senso_query(ctx, emitter, query, SENSO_RELEVANCE_CUTOFF).await {
            let strong_hit = chunks.iter().any(|c| c.relevance >= SENSO_RELEVANCE_CUTOFF);
            if strong_hit {
                acc.senso_search_used = true;
                phase1_hits = chunks
                    .into_iter()
                    .enumerate()
                    .map(|(i, chunk)| SearchHit {
                        title: "senso retrieval".to_string(),
                        url: chunk.source_url.unwrap_or_else(|| format!("senso://{}/{i}", ctx.episode_id)),
                        content_preview: chunk.content,
                    })
                    .collect();
                skip_phase1_search = true;
            }
        }
    }

    if ctx.is_cancelled() {
        return Err(EpisodeError::Cancelled);
    }

    if !skip_phase1_search {
        emit_progress(emitter, "phase1_search", 1, 4).await;
        let reformulations = tools.reformulate(ctx, query).await.map_err(|e| EpisodeError::ToolFailure {
            tool: "planner".to_string(),
            message: e.to_string(),
        })?;
        let reformulations = if reformulations.is_empty() { vec![query.to_string()] } else { reformulations };
        acc.queries_issued.extend(reformulations.iter().cloned());
        phase1_hits = run_searches(ctx, emitter, &tools, reformulations).await?;
    }

    if ctx.is_cancelled() {
        return Err(EpisodeError::Cancelled);
    }

    emit_progress(emitter, "phase1_evaluate", 2, 4).await;
    evaluate_and_extract(ctx, emitter, &tools, query, phase1_hits, &mut acc).await;

    let effective_cap = ctx.config.effective_max_followups();
    let extract_enabled = ctx.config.has_tool(ToolKind::Extract);
    let should_run_phase2 = extract_enabled && !acc.follow_ups.is_empty() && acc.followup_count < effective_cap;

    if should_run_phase2 {
        if ctx.is_cancelled() {
            return Err(EpisodeError::Cancelled);
        }
        emit_progress(emitter, "phase2_search", 3, 4).await;
        let combined_query = acc.follow_ups.join(" OR ");
        acc.queries_issued.push(combined_query.clone());
        match tools.search(ctx, emitter, &combined_query).await {
            Ok(hits) => {
                emit_progress(emitter, "phase2_evaluate", 4, 4).await;
                evaluate_and_extract(ctx, emitter, &tools, query, hits, &mut acc).await;
            }
            Err(_) => {
                // Search-tool failure policy (spec §7): phase 2 is a single
                // reformulation, so a failure here just means phase 2
                // contributed nothing; synthesize proceeds on phase 1 alone.
            }
        }
    }

    if ctx.is_cancelled() {
        return Err(EpisodeError::Cancelled);
    }

    let relevant_urls: Vec<String> = acc.sources.iter().filter(|s| s.is_relevant).map(|s| s.url.clone()).collect();

    let markdown = if acc.sources.iter().all(|s| !s.is_relevant) {
        no_evidence_markdown(query)
    } else {
        let input = SynthesisInput {
            original_query: query.to_string(),
            queries_issued: acc.queries_issued.clone(),
            relevant_urls: relevant_urls.clone(),
            learnings: acc.learnings.clone(),
        };
        tools.synthesize(ctx, &input).await.map_err(|e| EpisodeError::ToolFailure {
            tool: "synthesize".to_string(),
            message: e.to_string(),
        })?
    };

    if ctx.config.senso_first {
        if tools.senso_query(ctx, emitter, query, SENSO_RELEVANCE_CUTOFF).await.is_ok() {
            acc.senso_generate_used = true;
        }
    }

    ctx.metrics.add_followups(acc.followup_count).await;
    if acc.senso_search_used {
        ctx.metrics.mark_senso_search_used().await;
    }
    if acc.senso_generate_used {
        ctx.metrics.mark_senso_generate_used().await;
    }

    // "sources saved" selection (spec §4.6): relevant AND the URL appears in
    // the synthesized markdown, the approximate heuristic spec §9's open
    // questions flags as the best available without explicit citation
    // tracking in the synthesizer's output.
    let sources_saved: Vec<SourceRecord> =
        acc.sources.iter().filter(|s| s.is_relevant && markdown.contains(&s.url)).cloned().collect();

    Ok(ResearchOutcome { markdown, sources_returned: acc.sources, sources_saved, queries_issued: acc.queries_issued })
}

async fn run_searches(
    ctx: &EpisodeContext,
    emitter: &EventEmitter,
    tools: &Arc<ToolContracts>,
    reformulations: Vec<String>,
) -> Result<Vec<SearchHit>, EpisodeError> {
    let total = reformulations.len();

    let indexed_results: Vec<(usize, Result<Vec<SearchHit>, crate::domain::error::ToolError>)> =
        if ctx.config.parallel_searches && total > 1 {
            let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_SEARCHES.min(total)));
            let mut handles = Vec::with_capacity(total);
            for (idx, reformulation) in reformulations.into_iter().enumerate() {
                let tools = Arc::clone(tools);
                let ctx = ctx.clone();
                let emitter = emitter.clone();
                let semaphore = Arc::clone(&semaphore);
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    let result = tools.search(&ctx, &emitter, &reformulation).await;
                    (idx, result)
                }));
            }
            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await {
                    Ok(pair) => results.push(pair),
                    Err(_) => continue,
                }
            }
            results
        } else {
            let mut results = Vec::with_capacity(total);
            for (idx, reformulation) in reformulations.into_iter().enumerate() {
                let result = tools.search(ctx, emitter, &reformulation).await;
                results.push((idx, result));
            }
            results
        };

    let mut ordered = indexed_results;
    ordered.sort_by_key(|(idx, _)| *idx);

    let succeeded = ordered.iter().filter(|(_, r)| r.is_ok()).count();
    if succeeded == 0 {
        return Err(EpisodeError::ToolFailure {
            tool: "search".to_string(),
            message: "all phase-1 search reformulations failed".to_string(),
        });
    }

    let mut merged = Vec::new();
    for (_, result) in ordered {
        if let Ok(hits) = result {
            merged.extend(hits);
        }
    }
    Ok(merged)
}

async fn evaluate_and_extract(
    ctx: &EpisodeContext,
    emitter: &EventEmitter,
    tools: &Arc<ToolContracts>,
    query: &str,
    hits: Vec<SearchHit>,
    acc: &mut Accumulator,
) {
    if hits.is_empty() {
        return;
    }

    let novel_hits = acc.register_novel(hits);
    if novel_hits.is_empty() {
        return;
    }

    let batch: Vec<EvaluateInput> = novel_hits
        .iter()
        .map(|h| EvaluateInput { title: h.title.clone(), url: h.url.clone(), content_preview: h.content_preview.clone() })
        .collect();

    let verdicts = match tools.evaluate(ctx, emitter, query, &batch).await {
        Ok(verdicts) => verdicts,
        Err(_) => {
            // Evaluate-tool failure policy (spec §7): everything in this
            // batch is marked not-relevant rather than failing the episode.
            novel_hits
                .iter()
                .map(|h| crate::domain::ports::EvaluateVerdict {
                    url: h.url.clone(),
                    is_relevant: false,
                    reason: "Error in evaluation".to_string(),
                })
                .collect()
        }
    };

    let relevance: std::collections::HashMap<String, (bool, String)> =
        verdicts.into_iter().map(|v| (v.url, (v.is_relevant, v.reason))).collect();

    for hit in &novel_hits {
        let (is_relevant, reason) = relevance
            .get(&hit.url)
            .cloned()
            .unwrap_or((false, "not evaluated".to_string()));
        acc.sources.push(SourceRecord {
            title: hit.title.clone(),
            url: hit.url.clone(),
            content_preview: hit.content_preview.clone(),
            is_relevant,
            reason,
            learning: None,
        });
    }

    if !ctx.config.has_tool(ToolKind::Extract) {
        return;
    }

    let relevant_hits: Vec<&SearchHit> =
        novel_hits.iter().filter(|h| relevance.get(&h.url).map(|(r, _)| *r).unwrap_or(false)).collect();

    for hit in relevant_hits {
        if ctx.is_cancelled() {
            return;
        }
        match tools.extract(ctx, emitter, query, hit).await {
            Ok(outcome) => {
                if !outcome.learning.trim().is_empty() {
                    acc.learnings.push(outcome.learning.clone());
                    if let Some(source) = acc.sources.iter_mut().find(|s| s.url == hit.url) {
                        source.learning = Some(outcome.learning);
                    }
                }
                let remaining = ctx.config.effective_max_followups().saturating_sub(acc.followup_count);
                let take = (outcome.follow_up_questions.len() as u32).min(remaining) as usize;
                acc.follow_ups.extend(outcome.follow_up_questions.into_iter().take(take));
                acc.followup_count += take as u32;
            }
            Err(_) => {
                // Extract-tool failure policy (spec §7): drop this result's
                // learning, episode continues; it stays counted in
                // sources_returned via the record already pushed above.
            }
        }
    }
}

async fn emit_progress(emitter: &EventEmitter, phase: &str, step: u32, total: u32) {
    emitter.emit(CoreEvent::Progress { phase: phase.to_string(), step, total }).await;
}

fn no_evidence_markdown(query: &str) -> String {
    format!(
        "# {query}\n\nNo external evidence was found for this query during research. \
         This note reflects no verified sources."
    )
}
