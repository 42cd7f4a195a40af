use async_trait::async_trait;

use crate::domain::error::ToolError;

/// One retrieved chunk from the vector store (`sensoQuery`).
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub relevance: f64,
    pub source_url: Option<String>,
}

/// The `senso{Query,Upsert}` capability pair (spec §4.3, §4.4). Named
/// `VectorStore` rather than `Senso` so the port reads by what it does, not
/// by the external product it happens to be modeled on.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Retrieves chunks relevant to `query`, ordered by descending relevance.
    /// A "strong hit" per spec §4.3 is any result at or above
    /// `relevance_cutoff`.
    async fn query(&self, topic_id: &str, query: &str, relevance_cutoff: f64) -> Result<Vec<RetrievedChunk>, ToolError>;

    /// Stores new content for future retrieval under the same topic.
    async fn upsert(&self, topic_id: &str, content: &str, source_url: Option<&str>) -> Result<(), ToolError>;
}
