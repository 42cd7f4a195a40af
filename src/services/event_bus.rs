//! SSE event bus (spec §4.5): normalizes internal progress into the
//! wire-stable schema of spec §6.2, one channel per in-flight episode.
//!
//! Modeled on `adapters::mcp::events_http`'s broadcast-backed SSE stream, but
//! scoped per-episode with an `mpsc` channel rather than a single global
//! broadcast: each `ask/stream` request only ever wants one episode's
//! events, and a bounded `mpsc` gives the producer natural back-pressure
//! (spec §9, "producer task writes to a bounded channel; the HTTP handler
//! drains the channel to the wire").

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Internal event form, one-to-one with the wire schema in spec §6.2. The
/// HTTP layer (`adapters::http::sse`) is the only place this gets
/// serialized; keeping it as a Rust enum here lets the runtime construct
/// events without caring about JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    EpisodeCreated { #[serde(rename = "episodeId")] episode_id: Uuid },
    Status { status: String, message: String, #[serde(skip_serializing_if = "Option::is_none")] details: Option<Value> },
    ToolCall { tool: String, args: Value },
    ToolResult { tool: String, result: String, #[serde(skip_serializing_if = "Option::is_none")] details: Option<Value> },
    SearchResults { query: String, count: u32, urls: Vec<String> },
    EvaluationResults { evaluated: u32, relevant: u32, results: Vec<EvaluationResultWire> },
    LearningExtracted {
        learning: String,
        #[serde(rename = "followUpQuestions")]
        follow_up_questions: Vec<String>,
    },
    StrategyEvolved {
        #[serde(rename = "fromVersion")]
        from_version: Option<i64>,
        #[serde(rename = "toVersion")]
        to_version: i64,
        reason: String,
        changes: Value,
    },
    Progress { phase: String, step: u32, total: u32 },
    Partial { content: String },
    NoteCreated {
        #[serde(rename = "noteId")]
        note_id: Uuid,
        #[serde(rename = "noteTitle")]
        note_title: String,
    },
    Complete {
        #[serde(rename = "episodeId")]
        episode_id: Uuid,
        #[serde(rename = "noteId")]
        note_id: Uuid,
    },
    Error { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResultWire {
    pub url: String,
    #[serde(rename = "isRelevant")]
    pub is_relevant: bool,
    pub reason: String,
}

impl CoreEvent {
    /// Every stream must end with exactly one of these (spec §4.5, §6.2).
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// A cheap, cloneable handle bound to one episode's channel. Tool contracts
/// and the state machine hold one of these rather than the whole bus.
#[derive(Clone)]
pub struct EventEmitter {
    episode_id: Uuid,
    sender: tokio::sync::mpsc::Sender<CoreEvent>,
}

impl EventEmitter {
    /// Best-effort send: if the client has disconnected, the receiver is
    /// dropped and this simply discards the event (spec §4.5, "the runtime
    /// continues to completion ... further events are discarded").
    pub async fn emit(&self, event: CoreEvent) {
        let _ = self.sender.send(event).await;
    }

    pub const fn episode_id(&self) -> Uuid {
        self.episode_id
    }
}

/// Registry of live per-episode channels. One instance is shared across the
/// whole process.
#[derive(Default)]
pub struct EventBus {
    channels: Mutex<HashMap<Uuid, tokio::sync::mpsc::Sender<CoreEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a channel for `episode_id` and returns the emitter half (kept
    /// by the runtime) and the receiver half (drained by the HTTP handler).
    pub fn register(&self, episode_id: Uuid) -> (EventEmitter, tokio::sync::mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(episode_id, tx.clone());
        (EventEmitter { episode_id, sender: tx }, rx)
    }

    /// Drops the registry's handle to the channel. Called once the stream
    /// has emitted its terminal event; the emitter itself may still be held
    /// by in-flight tool calls momentarily, which is fine since `Sender` is
    /// cheap to keep alive past the last receive.
    pub fn unregister(&self, episode_id: Uuid) {
        self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&episode_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_emit_is_received_in_order() {
        let bus = EventBus::new();
        let episode_id = Uuid::new_v4();
        let (emitter, mut rx) = bus.register(episode_id);

        emitter.emit(CoreEvent::EpisodeCreated { episode_id }).await;
        emitter.emit(CoreEvent::Complete { episode_id, note_id: Uuid::new_v4() }).await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, CoreEvent::EpisodeCreated { .. }));
        let second = rx.recv().await.unwrap();
        assert!(second.is_terminal());
    }

    #[tokio::test]
    async fn emit_after_receiver_dropped_does_not_panic() {
        let bus = EventBus::new();
        let episode_id = Uuid::new_v4();
        let (emitter, rx) = bus.register(episode_id);
        drop(rx);
        emitter.emit(CoreEvent::Error { error: "boom".to_string() }).await;
        bus.unregister(episode_id);
    }

    #[test]
    fn wire_schema_uses_snake_case_type_tag() {
        let event = CoreEvent::Progress { phase: "phase1_search".to_string(), step: 1, total: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["phase"], "phase1_search");
    }

    #[test]
    fn wire_schema_uses_camel_case_fields() {
        let episode_id = Uuid::new_v4();
        let note_id = Uuid::new_v4();
        let json = serde_json::to_value(&CoreEvent::Complete { episode_id, note_id }).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["episodeId"], episode_id.to_string());
        assert_eq!(json["noteId"], note_id.to_string());
        assert!(json.get("episode_id").is_none());

        let json = serde_json::to_value(&CoreEvent::StrategyEvolved {
            from_version: Some(1),
            to_version: 2,
            reason: "low_senso_usage".to_string(),
            changes: serde_json::json!({"sensoFirst": true}),
        })
        .unwrap();
        assert_eq!(json["fromVersion"], 1);
        assert_eq!(json["toVersion"], 2);

        let json = serde_json::to_value(&CoreEvent::LearningExtracted {
            learning: "x".to_string(),
            follow_up_questions: vec!["y".to_string()],
        })
        .unwrap();
        assert_eq!(json["followUpQuestions"][0], "y");

        let json = serde_json::to_value(&EvaluationResultWire {
            url: "https://example.com".to_string(),
            is_relevant: true,
            reason: "on topic".to_string(),
        })
        .unwrap();
        assert_eq!(json["isRelevant"], true);
    }
}
