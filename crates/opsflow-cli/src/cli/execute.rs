//! `opsflow execute` and `opsflow run` commands.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::Value;

use opsflow_core::workflow::definition::{discover_workflows, load_workflow_file};
use opsflow_core::workflow::executor::ExecutionResult;
use opsflow_types::execution::ExecutionStatus;
use opsflow_types::workflow::WorkflowDefinition;

use crate::state::AppState;

pub async fn execute_file(
    state: &AppState,
    file: &Path,
    raw_inputs: &[String],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let def = load_workflow_file(file)
        .with_context(|| format!("failed to load '{}'", file.display()))?;
    execute(state, def, raw_inputs, dry_run, json).await
}

pub async fn run_by_name(
    state: &AppState,
    name: &str,
    raw_inputs: &[String],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let candidates = discover_workflows(&state.workflows_dir)
        .with_context(|| format!("failed to scan '{}'", state.workflows_dir.display()))?;
    let Some((_, def)) = candidates.into_iter().find(|(_, d)| d.name == name) else {
        bail!(
            "no workflow named '{}' under '{}'",
            name,
            state.workflows_dir.display()
        );
    };
    execute(state, def, raw_inputs, dry_run, json).await
}

async fn execute(
    state: &AppState,
    def: WorkflowDefinition,
    raw_inputs: &[String],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let report = state.validator.validate(&def);
    if !report.is_valid {
        bail!(
            "workflow '{}' failed validation:\n  {}",
            def.name,
            report.errors.join("\n  ")
        );
    }

    let name = def.name.clone();
    let inputs = parse_inputs(raw_inputs)?;
    let result = state.executor.execute(def, inputs, dry_run).await?;

    if json {
        let out = serde_json::json!({
            "execution_id": result.execution_id.to_string(),
            "workflow": name,
            "status": result.status,
            "dry_run": dry_run,
            "duration_ms": result.duration_ms,
            "outputs": result.outputs,
            "step_results": result.step_results,
            "error": result.error,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_result(&name, &result, dry_run);
    }

    if result.status != ExecutionStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(name: &str, result: &ExecutionResult, dry_run: bool) {
    let status = match result.status {
        ExecutionStatus::Completed => style("completed").green().bold(),
        ExecutionStatus::RolledBack => style("rolled back").yellow().bold(),
        _ => style("failed").red().bold(),
    };

    println!();
    println!(
        "  {} '{}' {} in {}ms{}",
        style("▸").bold(),
        style(name).cyan(),
        status,
        result.duration_ms,
        if dry_run {
            format!(" {}", style("(dry run)").dim())
        } else {
            String::new()
        }
    );
    println!("  Execution ID: {}", result.execution_id);

    if !result.step_results.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Step").fg(Color::Cyan),
                Cell::new("Result"),
                Cell::new("Duration"),
                Cell::new("Detail"),
            ]);
        for (id, step) in &result.step_results {
            let (mark, detail) = if step.success {
                ("✓".to_string(), String::new())
            } else {
                ("✗".to_string(), step.error.clone().unwrap_or_default())
            };
            table.add_row(vec![
                Cell::new(id),
                Cell::new(mark),
                Cell::new(format!("{}ms", step.duration_ms)),
                Cell::new(detail),
            ]);
        }
        println!("{table}");
    }

    if !result.outputs.is_empty() {
        println!("  Outputs:");
        for (key, value) in &result.outputs {
            println!("    {key} = {value}");
        }
    }
    if let Some(error) = &result.error {
        println!("  {} {error}", style("error:").red());
    }
    println!();
}

/// Parse repeated `NAME=VALUE` arguments. Values parse as JSON where
/// possible so numbers, booleans, arrays, and objects come through typed;
/// anything else is a plain string.
fn parse_inputs(raw: &[String]) -> Result<HashMap<String, Value>> {
    let mut inputs = HashMap::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("invalid input '{pair}', expected NAME=VALUE");
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        inputs.insert(name.to_string(), value);
    }
    Ok(inputs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inputs_parse_as_json_with_string_fallback() {
        let parsed = parse_inputs(&[
            "count=3".to_string(),
            "flag=true".to_string(),
            "name=release".to_string(),
            "tags=[\"a\",\"b\"]".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed["count"], json!(3));
        assert_eq!(parsed["flag"], json!(true));
        assert_eq!(parsed["name"], json!("release"));
        assert_eq!(parsed["tags"], json!(["a", "b"]));
    }

    #[test]
    fn malformed_input_pair_is_rejected() {
        assert!(parse_inputs(&["no-equals".to_string()]).is_err());
    }
}
