//! HTTP/SSE transport: the operator-facing surface over topics, strategies,
//! and streamed episode runs. Everything below this module talks to
//! `services` through ports only; nothing here knows about SQLite.

mod routes;
mod sse;
mod state;

pub use routes::build_router;
pub use state::AppState;
