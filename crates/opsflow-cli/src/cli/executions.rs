//! `opsflow list-executions` and `opsflow show-execution` commands.

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use opsflow_core::storage::{EXECUTION_PREFIX, SnapshotStore, execution_key};
use opsflow_types::execution::{ExecutionRecord, ExecutionStatus};

use crate::state::AppState;

pub async fn list_executions(
    state: &AppState,
    workflow: Option<&str>,
    json: bool,
) -> Result<()> {
    let keys = state
        .store
        .scan(EXECUTION_PREFIX)
        .await
        .context("failed to scan executions")?;

    let mut records: Vec<ExecutionRecord> = Vec::with_capacity(keys.len());
    for key in &keys {
        if let Some(value) = state.store.get(key).await? {
            let record: ExecutionRecord = serde_json::from_value(value)?;
            if workflow.is_none_or(|name| record.workflow_name == name) {
                records.push(record);
            }
        }
    }
    records.sort_by_key(|r| r.started_at);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  No executions recorded.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Workflow"),
            Cell::new("Status"),
            Cell::new("Steps"),
            Cell::new("Started"),
        ]);
    for r in &records {
        table.add_row(vec![
            Cell::new(r.execution_id),
            Cell::new(&r.workflow_name),
            status_cell(r.status),
            Cell::new(r.step_results.len()),
            Cell::new(r.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }
    println!("{table}");

    Ok(())
}

pub async fn show_execution(state: &AppState, id: &str, json: bool) -> Result<()> {
    let execution_id: Uuid = id.parse().context("invalid execution id")?;
    let Some(value) = state.store.get(&execution_key(&execution_id)).await? else {
        bail!("no execution '{id}' in the snapshot store");
    };
    let record: ExecutionRecord = serde_json::from_value(value)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Execution {} ({})",
        style("▸").bold(),
        style(record.execution_id).cyan(),
        style(format!("{:?}", record.status)).bold()
    );
    println!(
        "  Workflow: {} v{}",
        record.workflow_name, record.workflow_version
    );
    println!("  Started:  {}", record.started_at.to_rfc3339());
    if let Some(at) = record.completed_at {
        println!("  Finished: {}", at.to_rfc3339());
    }
    if record.dry_run {
        println!("  {}", style("dry run").dim());
    }
    for (step_id, result) in &record.step_results {
        let mark = if result.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {mark} {step_id} ({}ms)", result.duration_ms);
        if let Some(error) = &result.error {
            println!("      {}", style(error).red());
        }
    }
    if !record.outputs.is_empty() {
        println!("  Outputs:");
        for (key, value) in &record.outputs {
            println!("    {key} = {value}");
        }
    }
    if let Some(error) = &record.error {
        println!("  {} {error}", style("error:").red());
    }
    println!();

    Ok(())
}

fn status_cell(status: ExecutionStatus) -> Cell {
    match status {
        ExecutionStatus::Completed => Cell::new("completed").fg(Color::Green),
        ExecutionStatus::Running => Cell::new("running").fg(Color::Yellow),
        ExecutionStatus::RolledBack => Cell::new("rolled back").fg(Color::Yellow),
        ExecutionStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}
