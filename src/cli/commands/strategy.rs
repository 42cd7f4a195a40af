//! `strategy list` / `strategy promote`.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use uuid::Uuid;

use crate::cli::commands::CliContext;

pub async fn handle_list(ctx: &CliContext, topic_id: Uuid, json: bool) -> Result<()> {
    let strategies = ctx.strategy_store.list_versions(topic_id).await.context("failed to list strategies")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&strategies)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("version"),
        Cell::new("status"),
        Cell::new("rollout"),
        Cell::new("search depth"),
        Cell::new("time window"),
        Cell::new("model"),
    ]);
    for strategy in &strategies {
        table.add_row(vec![
            strategy.version.to_string(),
            strategy.status.to_string(),
            format!("{}%", strategy.rollout_percentage),
            strategy.config.search_depth.to_string(),
            strategy.config.time_window.to_string(),
            strategy.config.model.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn handle_promote(ctx: &CliContext, topic_id: Uuid, version: i64) -> Result<()> {
    ctx.strategy_store.promote(topic_id, version).await.context("failed to promote strategy")?;
    println!("promoted topic {topic_id} to strategy v{version}");
    Ok(())
}
