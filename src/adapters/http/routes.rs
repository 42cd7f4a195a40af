//! Route handlers for the operator-facing HTTP surface: topic CRUD,
//! evolution history, and the streamed ask endpoint. Modeled on
//! `adapters::mcp::events_http`'s `Router`/`with_state`/`TraceLayer` shape.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::adapters::http::sse::{error_only_stream, event_stream};
use crate::adapters::http::state::AppState;
use crate::domain::error::OrchestratorError;
use crate::domain::models::{EvolutionLogEntry, Note, Topic};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/topics", post(create_topic).get(list_topics))
        .route("/api/topics/{id}", get(get_topic))
        .route("/api/topics/{id}/evolutions", get(list_evolutions))
        .route("/api/topics/{id}/ask/stream", post(ask_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Maps the internal error taxonomy onto HTTP status codes: unknown
/// aggregates are 404s, request-shape problems are 400s, everything else
/// (transient tool/persistence failures) is a 500 with the message surfaced
/// for the operator to retry against.
impl IntoResponse for OrchestratorError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Strategy(crate::domain::error::StrategyError::UnknownTopic(_) | crate::domain::error::StrategyError::UnknownVersion { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Episode(crate::domain::error::EpisodeError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Strategy(crate::domain::error::StrategyError::InvalidRollout(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateTopicRequest {
    title: String,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct TopicResponse {
    #[serde(flatten)]
    topic: Topic,
}

/// `POST /api/topics` — creates the topic, then a default strategy for it,
/// so every topic always has exactly one servable version from the start.
async fn create_topic(
    State(state): State<AppState>,
    Json(body): Json<CreateTopicRequest>,
) -> Result<(StatusCode, Json<TopicResponse>), OrchestratorError> {
    let topic = Topic::new(body.title, body.description);
    state.topics.create(&topic).await?;
    state.strategy_store.create_default(topic.id).await?;
    Ok((StatusCode::CREATED, Json(TopicResponse { topic })))
}

async fn list_topics(State(state): State<AppState>) -> Result<Json<Vec<Topic>>, OrchestratorError> {
    Ok(Json(state.topics.list().await?))
}

#[derive(Debug, Serialize)]
struct TopicDetailResponse {
    #[serde(flatten)]
    topic: Topic,
    strategies: Vec<crate::domain::models::Strategy>,
    recent_episodes: Vec<crate::domain::models::Episode>,
    notes: Vec<Note>,
}

/// `GET /api/topics/:id` — the topic plus its strategies, most recent
/// episodes, and synthesized notes, so a UI can render the whole topic in
/// one round trip.
async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TopicDetailResponse>, OrchestratorError> {
    let topic = state.topics.get(id).await?.ok_or(OrchestratorError::Strategy(crate::domain::error::StrategyError::UnknownTopic(id)))?;
    let strategies = state.strategy_store.list_versions(id).await?;
    let recent_episodes = state.episodes.recent_for_topic(id, 20).await?;
    let notes = state.notes.list_for_topic(id).await?;
    Ok(Json(TopicDetailResponse { topic, strategies, recent_episodes, notes }))
}

/// `GET /api/topics/:id/evolutions` — ordered evolution log entries; meant
/// for UI polling rather than a live stream, so a plain JSON list is enough.
async fn list_evolutions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EvolutionLogEntry>>, OrchestratorError> {
    Ok(Json(state.evolution_log.list_for_topic(id).await?))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
    user_id: Option<String>,
}

/// `POST /api/topics/:id/ask/stream` — starts an episode and streams its
/// progress as SSE. Always responds HTTP 200 once the request is accepted;
/// runtime failures (including one that keeps an episode from ever being
/// created, e.g. `NoStrategyConfigured`) surface as a terminal `error` event
/// inside the stream rather than an HTTP error status (spec §6.1: "HTTP 4xx
/// only for request validation").
async fn ask_stream(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<AskRequest>) -> impl IntoResponse {
    match state.episode_runtime.start(id, body.query, body.user_id).await {
        Ok((_episode_id, receiver)) => event_stream(receiver).into_response(),
        Err(err) => error_only_stream(err.to_string()).into_response(),
    }
}
