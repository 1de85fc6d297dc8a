//! Rollback bookkeeping and execution.
//!
//! Steps record compensating actions as they succeed; on failure (or by
//! request) the manager replays them in reverse order. Each compensation is
//! attempted independently: one failing does not stop the rest, and the
//! stack is cleared after the attempt either way.

use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use opsflow_types::rollback::{RollbackAction, RollbackActionKind, RollbackReport};
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use crate::plugin::PluginRegistry;

use super::context::ExecutionContext;

/// Tracks compensating actions per execution.
pub struct RollbackManager {
    /// execution id -> recorded actions, in recording order.
    stacks: DashMap<Uuid, Vec<RollbackAction>>,
    plugins: Arc<PluginRegistry>,
}

impl RollbackManager {
    pub fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self {
            stacks: DashMap::new(),
            plugins,
        }
    }

    /// Record a compensating action for a step that just succeeded.
    pub fn record_action(
        &self,
        execution_id: Uuid,
        step_id: &str,
        kind: RollbackActionKind,
        description: String,
        data: Value,
    ) {
        let action = RollbackAction {
            step_id: step_id.to_string(),
            kind,
            description,
            data,
            recorded_at: Utc::now(),
        };
        self.stacks.entry(execution_id).or_default().push(action);
    }

    /// Number of actions currently recorded for an execution.
    pub fn pending(&self, execution_id: &Uuid) -> usize {
        self.stacks.get(execution_id).map_or(0, |s| s.len())
    }

    /// Discard the stack without executing it. Used when a run completes.
    pub fn discard(&self, execution_id: &Uuid) {
        self.stacks.remove(execution_id);
    }

    /// Execute all recorded compensations in reverse order.
    ///
    /// Errors are caught per action and collected into the report. The
    /// stack is cleared after the attempt regardless of outcome, so
    /// rollback never runs twice for the same execution.
    pub async fn rollback(&self, ctx: &ExecutionContext) -> RollbackReport {
        let actions = self
            .stacks
            .remove(&ctx.execution_id)
            .map(|(_, actions)| actions)
            .unwrap_or_default();

        let mut report = RollbackReport {
            success: true,
            actions_rolled_back: 0,
            errors: Vec::new(),
        };

        if ctx.dry_run {
            info!(
                execution_id = %ctx.execution_id,
                actions = actions.len(),
                "dry run, skipping rollback actions"
            );
            return report;
        }

        for action in actions.iter().rev() {
            info!(
                execution_id = %ctx.execution_id,
                step_id = %action.step_id,
                kind = ?action.kind,
                "rolling back"
            );
            match self.apply(action).await {
                Ok(()) => report.actions_rolled_back += 1,
                Err(err) => {
                    warn!(
                        execution_id = %ctx.execution_id,
                        step_id = %action.step_id,
                        error = %err,
                        "rollback action failed"
                    );
                    report.success = false;
                    report
                        .errors
                        .push(format!("step '{}': {err}", action.step_id));
                }
            }
        }

        report
    }

    async fn apply(&self, action: &RollbackAction) -> Result<(), String> {
        match action.kind {
            RollbackActionKind::Command => self.apply_command(&action.data).await,
            RollbackActionKind::FileRestore => apply_file_restore(&action.data).await,
            RollbackActionKind::DirectoryRestore => apply_directory_restore(&action.data).await,
            RollbackActionKind::PluginAction => self.apply_plugin_action(&action.data).await,
        }
    }

    async fn apply_command(&self, data: &Value) -> Result<(), String> {
        let command = data["command"]
            .as_str()
            .ok_or_else(|| "missing rollback command".to_string())?;
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = data["working_dir"].as_str() {
            cmd.current_dir(dir);
        }
        let output = cmd.output().await.map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "rollback command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    async fn apply_plugin_action(&self, data: &Value) -> Result<(), String> {
        let plugin_name = data["plugin"]
            .as_str()
            .ok_or_else(|| "missing plugin name".to_string())?;
        let action_name = data["action"]
            .as_str()
            .ok_or_else(|| "missing action name".to_string())?;
        let params = data.get("params").cloned().unwrap_or(Value::Null);
        let plugin = self.plugins.resolve(plugin_name).map_err(|e| e.to_string())?;
        plugin
            .invoke(action_name, &params)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

async fn apply_file_restore(data: &Value) -> Result<(), String> {
    let path = data["path"]
        .as_str()
        .ok_or_else(|| "missing file path".to_string())?;
    match data["backup_path"].as_str() {
        // A backup exists: put the original contents back.
        Some(backup) => {
            tokio::fs::copy(backup, path)
                .await
                .map_err(|e| format!("restoring '{path}' from backup: {e}"))?;
            let _ = tokio::fs::remove_file(backup).await;
            Ok(())
        }
        // No backup means the step created the file. Undo is deletion.
        None => match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("removing '{path}': {e}")),
        },
    }
}

async fn apply_directory_restore(data: &Value) -> Result<(), String> {
    let path = data["path"]
        .as_str()
        .ok_or_else(|| "missing directory path".to_string())?;
    // Only remove directories the step itself created.
    if !data["created"].as_bool().unwrap_or(false) {
        return Ok(());
    }
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("removing '{path}': {e}")),
    }
}

// ---------------------------------------------------------------------------
// Heuristic suggestions
// ---------------------------------------------------------------------------

/// Suggest a compensating command for well-known command shapes.
///
/// Used when a command step declares `on_failure: rollback` without an
/// explicit `rollback_command`. Returns `None` for anything not clearly
/// invertible.
pub fn suggest_rollback_command(command: &str) -> Option<String> {
    let trimmed = command.trim();

    if let Some(rest) = trimmed.strip_prefix("mkdir ") {
        let target = rest.trim_start_matches("-p ").trim();
        return Some(format!("rmdir {target}"));
    }
    if let Some(rest) = trimmed.strip_prefix("touch ") {
        return Some(format!("rm -f {}", rest.trim()));
    }
    if let Some(rest) = trimmed.strip_prefix("git add ") {
        return Some(format!("git reset HEAD {}", rest.trim()));
    }
    if trimmed.starts_with("git commit") {
        return Some("git reset HEAD~1".to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("npm install ") {
        let package = rest.trim();
        if !package.starts_with('-') && !package.is_empty() {
            return Some(format!("npm uninstall {package}"));
        }
    }
    if let Some(rest) = trimmed.strip_prefix("pip install ") {
        let package = rest.trim();
        if !package.starts_with('-') && !package.is_empty() {
            return Some(format!("pip uninstall -y {package}"));
        }
    }

    None
}

/// Rollback payload for a command compensation.
pub fn command_rollback_data(command: &str, working_dir: Option<&str>) -> Value {
    match working_dir {
        Some(dir) => json!({ "command": command, "working_dir": dir }),
        None => json!({ "command": command }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
