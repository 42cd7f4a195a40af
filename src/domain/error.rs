//! Per-concern error types, each carrying an `is_transient`/`is_permanent`
//! classification where propagation policy depends on it.

use thiserror::Error;
use uuid::Uuid;

/// Errors from the strategy store (spec §4.1 failure modes).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("topic has no configured strategy: {0}")]
    NoStrategyConfigured(Uuid),

    #[error("concurrent createCandidate for topic {0}")]
    VersionConflict(Uuid),

    #[error("unknown topic: {0}")]
    UnknownTopic(Uuid),

    #[error("unknown strategy version {version} for topic {topic_id}")]
    UnknownVersion { topic_id: Uuid, version: i64 },

    #[error("rollout percentage {0} outside [0,100]")]
    InvalidRollout(i64),
}

impl StrategyError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::VersionConflict(_))
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Errors from running an episode (spec §4.2).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EpisodeError {
    #[error("episode not found: {0}")]
    NotFound(Uuid),

    #[error("episode {0} already in a terminal state")]
    AlreadyTerminal(Uuid),

    #[error("episode cancelled")]
    Cancelled,

    #[error("tool '{tool}' failed: {message}")]
    ToolFailure { tool: String, message: String },
}

impl EpisodeError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ToolFailure { .. })
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Errors surfaced by a tool-contract invocation (spec §4.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' timed out")]
    Timeout(String),

    #[error("tool '{0}' call cancelled")]
    Cancelled(String),

    #[error("tool '{tool}' returned an error: {message}")]
    RemoteFailure { tool: String, message: String },

    #[error("tool '{0}' is not enabled for this strategy")]
    NotEnabled(String),
}

impl ToolError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RemoteFailure { .. })
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Errors from loading and validating configuration (§6.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("invalid yaml in {path}: {message}")]
    InvalidYaml { path: String, message: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("environment variable error: {0}")]
    EnvVar(String),
}

/// Errors from the SQLite persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("row not found")]
    RowNotFound,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// The crate's single public error type at adapter boundaries. `anyhow` is
/// used only at the CLI/`main` boundary, where a typed error would just be
/// unwrapped into a message anyway.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Episode(#[from] EpisodeError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
