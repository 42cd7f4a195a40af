//! `topic create` / `topic show` / `topic list`.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use uuid::Uuid;

use crate::cli::commands::CliContext;
use crate::domain::models::Topic;

pub async fn handle_create(ctx: &CliContext, title: String, description: Option<String>, json: bool) -> Result<()> {
    let topic = Topic::new(title, description);
    ctx.topics.create(&topic).await.context("failed to create topic")?;
    ctx.strategy_store.create_default(topic.id).await.context("failed to create default strategy")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&topic)?);
    } else {
        println!("created topic {} \"{}\"", topic.id, topic.title);
    }
    Ok(())
}

pub async fn handle_show(ctx: &CliContext, topic_id: Uuid, json: bool) -> Result<()> {
    let topic = ctx.topics.get(topic_id).await.context("failed to load topic")?.context("topic not found")?;
    let strategies = ctx.strategy_store.list_versions(topic_id).await.context("failed to load strategies")?;
    let episodes = ctx.episodes.recent_for_topic(topic_id, 10).await.context("failed to load episodes")?;
    let notes = ctx.notes.list_for_topic(topic_id).await.context("failed to load notes")?;

    if json {
        println!(
            "{}",
            serde_json::json!({"topic": topic, "strategies": strategies, "recentEpisodes": episodes, "notes": notes})
        );
        return Ok(());
    }

    println!("{} \"{}\" (active strategy v{:?})", topic.id, topic.title, topic.active_strategy_version);

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("version"), Cell::new("status"), Cell::new("rollout"), Cell::new("model")]);
    for strategy in &strategies {
        table.add_row(vec![
            strategy.version.to_string(),
            strategy.status.to_string(),
            format!("{}%", strategy.rollout_percentage),
            strategy.config.model.clone(),
        ]);
    }
    println!("{table}");

    println!("recent episodes: {}", episodes.len());
    println!("notes: {}", notes.len());
    Ok(())
}

pub async fn handle_list(ctx: &CliContext, json: bool) -> Result<()> {
    let topics = ctx.topics.list().await.context("failed to list topics")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("id"), Cell::new("title"), Cell::new("active strategy")]);
    for topic in &topics {
        table.add_row(vec![
            topic.id.to_string(),
            topic.title.clone(),
            topic.active_strategy_version.map_or_else(|| "-".to_string(), |v| v.to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}
