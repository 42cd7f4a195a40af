//! CLI type definitions: clap command structures for the operator surface.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "synthline")]
#[command(about = "Self-evolving research orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Topic management commands
    #[command(subcommand)]
    Topic(TopicCommands),

    /// Strategy management commands
    #[command(subcommand)]
    Strategy(StrategyCommands),

    /// Run a query against a topic and stream the episode's progress
    Ask {
        /// Topic ID to query
        topic_id: Uuid,

        /// The research question
        query: String,

        /// Optional caller identifier, recorded on the episode
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TopicCommands {
    /// Create a topic and its default strategy
    Create {
        /// Topic title
        title: String,

        /// Optional longer description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show a topic with its strategies, recent episodes, and notes
    Show {
        /// Topic ID
        topic_id: Uuid,
    },

    /// List every topic
    List,
}

#[derive(Subcommand)]
pub enum StrategyCommands {
    /// List every strategy version for a topic
    List {
        /// Topic ID
        topic_id: Uuid,
    },

    /// Promote a candidate strategy to active
    Promote {
        /// Topic ID
        topic_id: Uuid,

        /// Strategy version to promote
        version: i64,
    },
}
