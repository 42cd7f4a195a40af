//! Shared scaffolding for integration tests: an in-memory SQLite database with
//! migrations applied, plus the real repositories wired against it. Mirrors
//! the teacher's `tests/helpers/database.rs` + `tests/common/mod.rs` pattern
//! of a one-call setup returning everything a test needs.

use std::sync::Arc;

use synthline::adapters::rng::SeededRngSource;
use synthline::adapters::sqlite::connection::create_test_pool;
use synthline::adapters::sqlite::migrations::Migrator;
use synthline::adapters::sqlite::{
    SqliteEpisodeRepository, SqliteEvolutionLogRepository, SqliteNoteRepository, SqliteStrategyRepository,
    SqliteTopicRepository,
};
use synthline::adapters::tools::mock::{MockEvaluateTool, MockExtractTool, MockLlmPlanner, MockSearchTool, MockVectorStore};
use synthline::domain::ports::TopicRepository;
use synthline::services::event_bus::EventBus;
use synthline::services::evolution_analyzer::EvolutionAnalyzer;
use synthline::services::strategy_store::StrategyStoreService;
use synthline::services::tool_contracts::{ToolContracts, ToolTimeouts};
use synthline::services::EpisodeRuntime;

pub const DEFAULT_MODEL: &str = "research-standard";

/// The repository set every test builds on, backed by one in-memory database.
pub struct TestRepos {
    pub topics: Arc<SqliteTopicRepository>,
    pub strategies: Arc<SqliteStrategyRepository>,
    pub episodes: Arc<SqliteEpisodeRepository>,
    pub notes: Arc<SqliteNoteRepository>,
    pub evolution_log: Arc<SqliteEvolutionLogRepository>,
}

/// Spins up a fresh `sqlite::memory:` pool and runs every embedded migration
/// against it, then wraps each table behind its real SQLite adapter.
pub async fn setup_test_repos() -> TestRepos {
    let pool = create_test_pool().await.expect("failed to open in-memory test database");
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations().await.expect("failed to run migrations against test database");

    TestRepos {
        topics: Arc::new(SqliteTopicRepository::new(pool.clone())),
        strategies: Arc::new(SqliteStrategyRepository::new(pool.clone())),
        episodes: Arc::new(SqliteEpisodeRepository::new(pool.clone())),
        notes: Arc::new(SqliteNoteRepository::new(pool.clone())),
        evolution_log: Arc::new(SqliteEvolutionLogRepository::new(pool)),
    }
}

/// The scripted tool set an episode runtime talks to in place of real
/// search/evaluate/extract/vector-store/LLM backends.
pub struct MockTools {
    pub search: Arc<MockSearchTool>,
    pub evaluate: Arc<MockEvaluateTool>,
    pub extract: Arc<MockExtractTool>,
    pub vector_store: Arc<MockVectorStore>,
    pub planner: Arc<MockLlmPlanner>,
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            search: Arc::new(MockSearchTool::new()),
            evaluate: Arc::new(MockEvaluateTool::new()),
            extract: Arc::new(MockExtractTool::new()),
            vector_store: Arc::new(MockVectorStore::new()),
            planner: Arc::new(MockLlmPlanner::new()),
        }
    }

    pub fn into_contracts(self, timeouts: ToolTimeouts) -> Arc<ToolContracts> {
        Arc::new(ToolContracts::new(self.search, self.evaluate, self.extract, self.vector_store, self.planner, timeouts))
    }
}

/// A fully wired runtime: real SQLite repos, scripted tools, and a seeded RNG
/// so strategy selection is deterministic across test runs.
pub struct TestHarness {
    pub repos: TestRepos,
    pub strategy_store: Arc<StrategyStoreService>,
    pub evolution_analyzer: Arc<EvolutionAnalyzer>,
    pub episode_runtime: Arc<EpisodeRuntime>,
}

/// Builds a harness with a fresh in-memory database, a seeded (not OS)
/// strategy-selection RNG, and the given tool scripting.
pub async fn setup_harness(seed: u64, min_episodes_for_evolution: u32, tools: MockTools) -> TestHarness {
    let repos = setup_test_repos().await;
    let rng = Arc::new(SeededRngSource::new(seed));
    let strategy_store = Arc::new(StrategyStoreService::new(
        repos.strategies.clone(),
        repos.topics.clone(),
        repos.evolution_log.clone(),
        rng,
        DEFAULT_MODEL,
    ));

    let contracts = tools.into_contracts(ToolTimeouts::default());
    let event_bus = Arc::new(EventBus::new());
    let evolution_analyzer = Arc::new(EvolutionAnalyzer::new(
        repos.episodes.clone(),
        repos.evolution_log.clone(),
        strategy_store.clone(),
        min_episodes_for_evolution,
    ));
    let episode_runtime = Arc::new(EpisodeRuntime::new(
        strategy_store.clone(),
        repos.episodes.clone(),
        repos.notes.clone(),
        contracts,
        event_bus,
        evolution_analyzer.clone(),
    ));

    TestHarness { repos, strategy_store, evolution_analyzer, episode_runtime }
}

/// Creates a topic with a default (v1, active, 100% rollout) strategy, the
/// same two steps `POST /api/topics` performs.
pub async fn create_topic_with_default_strategy(
    harness: &TestHarness,
    title: &str,
) -> synthline::domain::models::Topic {
    let topic = synthline::domain::models::Topic::new(title.to_string(), None);
    harness.repos.topics.create(&topic).await.expect("failed to insert topic");
    harness.strategy_store.create_default(topic.id).await.expect("failed to create default strategy");
    topic
}

/// Drains an event receiver to completion, returning every event in order.
/// Integration tests assert on this rather than polling the database mid-run.
pub async fn drain_events(
    mut receiver: tokio::sync::mpsc::Receiver<synthline::services::CoreEvent>,
) -> Vec<synthline::services::CoreEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}
