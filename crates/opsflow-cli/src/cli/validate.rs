//! `opsflow validate` command.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use opsflow_core::workflow::definition::load_workflow_file;

use crate::state::AppState;

pub fn validate(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let def = load_workflow_file(file)
        .with_context(|| format!("failed to load '{}'", file.display()))?;
    let report = state.validator.validate(&def);

    if json {
        let out = serde_json::json!({
            "workflow": def.name,
            "version": def.version,
            "valid": report.is_valid,
            "errors": report.errors,
            "warnings": report.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        if !report.is_valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!();
    if report.is_valid {
        println!(
            "  {} '{}' is valid ({} steps)",
            style("✓").green().bold(),
            style(&def.name).cyan(),
            def.steps.len()
        );
    } else {
        println!(
            "  {} '{}' failed validation",
            style("✗").red().bold(),
            style(&def.name).cyan()
        );
        for error in &report.errors {
            println!("    {} {error}", style("error:").red());
        }
    }
    for warning in &report.warnings {
        println!("    {} {warning}", style("warning:").yellow());
    }
    println!();

    if !report.is_valid {
        std::process::exit(1);
    }
    Ok(())
}
