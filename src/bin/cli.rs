//! CLI entry point: wires the same hexagonal layers as the HTTP server does
//! in `main.rs`, then dispatches one subcommand instead of serving forever.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use synthline::adapters::rng::OsRngSource;
use synthline::adapters::sqlite::connection::create_pool;
use synthline::adapters::sqlite::migrations::Migrator;
use synthline::adapters::sqlite::{
    SqliteEpisodeRepository, SqliteEvolutionLogRepository, SqliteNoteRepository, SqliteStrategyRepository,
    SqliteTopicRepository,
};
use synthline::adapters::tools::{HttpEvaluateTool, HttpExtractTool, HttpLlmPlanner, HttpSearchTool, HttpVectorStore};
use synthline::cli::commands::{ask, strategy, topic, CliContext};
use synthline::cli::types::{Cli, Commands, StrategyCommands, TopicCommands};
use synthline::infrastructure::{logging, ConfigLoader};
use synthline::services::event_bus::EventBus;
use synthline::services::evolution_analyzer::EvolutionAnalyzer;
use synthline::services::strategy_store::StrategyStoreService;
use synthline::services::tool_contracts::{ToolContracts, ToolTimeouts};
use synthline::services::EpisodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    let pool = create_pool(&config.database.url, None).await.context("failed to connect to database")?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations().await.context("failed to run database migrations")?;

    let topics = Arc::new(SqliteTopicRepository::new(pool.clone()));
    let episodes = Arc::new(SqliteEpisodeRepository::new(pool.clone()));
    let notes = Arc::new(SqliteNoteRepository::new(pool.clone()));
    let strategies = Arc::new(SqliteStrategyRepository::new(pool.clone()));
    let evolution_log = Arc::new(SqliteEvolutionLogRepository::new(pool));

    let rng = Arc::new(OsRngSource);
    let strategy_store = Arc::new(StrategyStoreService::new(
        strategies,
        topics.clone(),
        evolution_log.clone(),
        rng,
        config.llm.default_model.clone(),
    ));

    let search_tool = Arc::new(HttpSearchTool::new(config.tools.search_url.clone(), config.tool_timeouts.search_secs));
    let evaluate_tool =
        Arc::new(HttpEvaluateTool::new(config.tools.evaluate_url.clone(), config.tool_timeouts.evaluate_secs));
    let extract_tool =
        Arc::new(HttpExtractTool::new(config.tools.extract_url.clone(), config.tool_timeouts.extract_secs));
    let vector_store =
        Arc::new(HttpVectorStore::new(config.vector_store.url.clone(), config.tool_timeouts.vector_store_secs));
    let llm_planner = Arc::new(HttpLlmPlanner::new(
        config.llm.base_url.clone(),
        config.llm.default_model.clone(),
        config.tool_timeouts.synthesize_secs,
    ));
    let timeouts = ToolTimeouts {
        search: std::time::Duration::from_secs(config.tool_timeouts.search_secs),
        evaluate: std::time::Duration::from_secs(config.tool_timeouts.evaluate_secs),
        extract: std::time::Duration::from_secs(config.tool_timeouts.extract_secs),
        vector_store: std::time::Duration::from_secs(config.tool_timeouts.vector_store_secs),
        planner: std::time::Duration::from_secs(config.tool_timeouts.synthesize_secs),
    };
    let tools = Arc::new(ToolContracts::new(search_tool, evaluate_tool, extract_tool, vector_store, llm_planner, timeouts));

    let event_bus = Arc::new(EventBus::new());
    let evolution_analyzer = Arc::new(EvolutionAnalyzer::new(
        episodes.clone(),
        evolution_log.clone(),
        strategy_store.clone(),
        config.evolution.min_episodes_for_evolution,
    ));
    let episode_runtime = Arc::new(EpisodeRuntime::new(
        strategy_store.clone(),
        episodes.clone(),
        notes.clone(),
        tools,
        event_bus,
        evolution_analyzer,
    ));

    let ctx = CliContext { topics, episodes, notes, evolution_log, strategy_store, episode_runtime };

    match cli.command {
        Commands::Topic(TopicCommands::Create { title, description }) => {
            topic::handle_create(&ctx, title, description, cli.json).await
        }
        Commands::Topic(TopicCommands::Show { topic_id }) => topic::handle_show(&ctx, topic_id, cli.json).await,
        Commands::Topic(TopicCommands::List) => topic::handle_list(&ctx, cli.json).await,
        Commands::Strategy(StrategyCommands::List { topic_id }) => strategy::handle_list(&ctx, topic_id, cli.json).await,
        Commands::Strategy(StrategyCommands::Promote { topic_id, version }) => {
            strategy::handle_promote(&ctx, topic_id, version).await
        }
        Commands::Ask { topic_id, query, user_id } => ask::handle_ask(&ctx, topic_id, query, user_id, cli.json).await,
    }
}
