//! `ask` — runs a query and prints the episode's SSE-equivalent event
//! stream to stdout, one line per event, until a terminal event arrives.

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::cli::commands::CliContext;
use crate::services::CoreEvent;

pub async fn handle_ask(ctx: &CliContext, topic_id: Uuid, query: String, user_id: Option<String>, json: bool) -> Result<()> {
    let (episode_id, mut receiver) = ctx.episode_runtime.start(topic_id, query, user_id).await.context("failed to start episode")?;

    if !json {
        println!("episode {episode_id} started");
    }

    while let Some(event) = receiver.recv().await {
        let terminal = event.is_terminal();
        print_event(&event, json)?;
        if terminal {
            break;
        }
    }

    Ok(())
}

fn print_event(event: &CoreEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        CoreEvent::EpisodeCreated { episode_id } => println!("[created] episode {episode_id}"),
        CoreEvent::Status { status, message, .. } => println!("[{status}] {message}"),
        CoreEvent::ToolCall { tool, .. } => println!("[tool_call] {tool}"),
        CoreEvent::ToolResult { tool, result, .. } => println!("[tool_result] {tool}: {result}"),
        CoreEvent::SearchResults { query, count, .. } => println!("[search_results] \"{query}\" -> {count} urls"),
        CoreEvent::EvaluationResults { evaluated, relevant, .. } => {
            println!("[evaluation_results] {relevant}/{evaluated} relevant");
        }
        CoreEvent::LearningExtracted { learning, follow_up_questions } => {
            println!("[learning] {learning} ({} follow-ups)", follow_up_questions.len());
        }
        CoreEvent::StrategyEvolved { from_version, to_version, reason, .. } => {
            println!("[strategy_evolved] v{from_version:?} -> v{to_version}: {reason}");
        }
        CoreEvent::Progress { phase, step, total } => println!("[progress] {phase} {step}/{total}"),
        CoreEvent::Partial { content } => print!("{content}"),
        CoreEvent::NoteCreated { note_id, note_title } => println!("[note_created] {note_id} \"{note_title}\""),
        CoreEvent::Complete { episode_id, note_id } => println!("[complete] episode {episode_id} -> note {note_id}"),
        CoreEvent::Error { error } => println!("[error] {error}"),
    }
    Ok(())
}
