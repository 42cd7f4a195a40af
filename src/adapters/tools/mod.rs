//! Adapters for the external research collaborators spec.md §1 keeps out of
//! scope: a real `reqwest`-backed client per tool, and an in-process mock set
//! for tests.

pub mod http;
pub mod mock;

pub use http::{HttpEvaluateTool, HttpExtractTool, HttpLlmPlanner, HttpSearchTool, HttpVectorStore};
pub use mock::{MockEvaluateTool, MockExtractTool, MockLlmPlanner, MockSearchTool, MockVectorStore};
