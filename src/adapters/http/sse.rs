//! Converts the runtime's internal `CoreEvent` stream into outbound SSE
//! frames, following `adapters::mcp::events_http`'s
//! `Sse<impl Stream<Item = Result<Event, Infallible>>>` + `KeepAlive` shape.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::services::CoreEvent;

/// Heartbeat interval for idle SSE connections; stops intermediary proxies
/// from closing an otherwise-idle connection while a long search runs.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drains `receiver` to completion, converting each `CoreEvent` into one SSE
/// `Event` with the wire JSON body. The receiver closes once the runtime's
/// background task emits its terminal event and unregisters from the event
/// bus; every stream ends with exactly one of `complete`/`error`.
pub fn event_stream(receiver: mpsc::Receiver<CoreEvent>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(receiver).map(|event| {
        let event_type = wire_type(&event);
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_type).data(payload))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL))
}

/// A one-event stream carrying only a terminal `error` (spec §6.1: runtime
/// failures, including one that prevents an episode from ever being
/// created, still get HTTP 200 with a final `error` event rather than an
/// HTTP error status — only request-shape problems are 4xx).
pub fn error_only_stream(message: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event = CoreEvent::Error { error: message };
    let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    let stream = stream::once(async move { Ok(Event::default().event("error").data(payload)) });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL))
}

/// The `type` discriminant the wire schema already carries in the JSON body;
/// surfaced again as the SSE `event:` field so clients can dispatch without
/// parsing the body first.
fn wire_type(event: &CoreEvent) -> &'static str {
    match event {
        CoreEvent::EpisodeCreated { .. } => "episode_created",
        CoreEvent::Status { .. } => "status",
        CoreEvent::ToolCall { .. } => "tool_call",
        CoreEvent::ToolResult { .. } => "tool_result",
        CoreEvent::SearchResults { .. } => "search_results",
        CoreEvent::EvaluationResults { .. } => "evaluation_results",
        CoreEvent::LearningExtracted { .. } => "learning_extracted",
        CoreEvent::StrategyEvolved { .. } => "strategy_evolved",
        CoreEvent::Progress { .. } => "progress",
        CoreEvent::Partial { .. } => "partial",
        CoreEvent::NoteCreated { .. } => "note_created",
        CoreEvent::Complete { .. } => "complete",
        CoreEvent::Error { .. } => "error",
    }
}
