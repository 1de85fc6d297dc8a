//! `opsflow list-workflows` command.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use opsflow_core::workflow::definition::discover_workflows;

use crate::state::AppState;

pub fn list_workflows(state: &AppState, json: bool) -> Result<()> {
    let defs = discover_workflows(&state.workflows_dir)
        .with_context(|| format!("failed to scan '{}'", state.workflows_dir.display()))?;

    if json {
        let out: Vec<_> = defs
            .iter()
            .map(|(path, d)| {
                serde_json::json!({
                    "name": d.name,
                    "version": d.version,
                    "description": d.description,
                    "steps": d.steps.len(),
                    "inputs": d.inputs.len(),
                    "file": path.display().to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if defs.is_empty() {
        println!();
        println!(
            "  No workflows found under '{}'.",
            state.workflows_dir.display()
        );
        println!(
            "  Run one directly with: {}",
            style("opsflow execute <file.yaml>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Steps"),
            Cell::new("Inputs"),
            Cell::new("File"),
        ]);
    for (path, d) in &defs {
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(&d.version),
            Cell::new(d.steps.len()),
            Cell::new(d.inputs.len()),
            Cell::new(path.display().to_string()),
        ]);
    }
    println!("{table}");

    Ok(())
}
