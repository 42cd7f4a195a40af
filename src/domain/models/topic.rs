//! Topic: the long-lived research subject a strategy and its episodes belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A long-lived research subject. Owns its strategies, episodes, notes, and
/// evolution log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// The strategy version currently serving queries, if one has been promoted.
    pub active_strategy_version: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(title: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            active_strategy_version: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_topic_has_no_active_strategy() {
        let topic = Topic::new("quantum annealing".to_string(), None);
        assert!(topic.active_strategy_version.is_none());
        assert_eq!(topic.title, "quantum annealing");
    }
}
