//! Note: the synthesized markdown artifact produced by a successfully
//! completed episode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A synthesized output tied to a topic. Created only on successful episode
/// completion (spec §3); there is no partial or draft state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub content: String,
    pub note_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Builds a note from synthesized content, deriving the title from its
    /// first non-empty line, falling back to the first 80 characters of the
    /// originating query when the content has none (spec §4.2 step 4).
    pub fn from_synthesis(topic_id: Uuid, query: &str, content: String, note_type: Option<String>) -> Self {
        let title = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.trim_start_matches('#').trim().to_string())
            .unwrap_or_else(|| query.chars().take(80).collect());

        Self {
            id: Uuid::new_v4(),
            topic_id,
            title,
            content,
            note_type,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_derives_from_first_non_empty_line() {
        let note = Note::from_synthesis(
            Uuid::new_v4(),
            "what are agent planners?",
            "\n\n# Agent Planners Overview\n\nBody text.".to_string(),
            None,
        );
        assert_eq!(note.title, "Agent Planners Overview");
    }

    #[test]
    fn title_falls_back_to_query_prefix_when_content_is_blank() {
        let long_query = "x".repeat(200);
        let note = Note::from_synthesis(Uuid::new_v4(), &long_query, "   \n  ".to_string(), None);
        assert_eq!(note.title.len(), 80);
    }
}
