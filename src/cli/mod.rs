//! Operator CLI: the same operations the HTTP surface exposes, for local use
//! and scripting, following `cli::types::Cli`/`Commands`'s subcommand
//! structure.

pub mod commands;
pub mod types;

pub use types::{Cli, Commands, StrategyCommands, TopicCommands};
