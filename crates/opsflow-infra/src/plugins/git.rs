//! Git plugin.
//!
//! Thin subprocess wrapper over the `git` binary. Covers the staging and
//! commit actions workflows pair with the executor's rollback heuristics
//! (`git add` -> `git reset HEAD`, `git commit` -> `git reset HEAD~1`).

use std::process::Stdio;

use futures_util::future::BoxFuture;
use opsflow_core::plugin::Plugin;
use opsflow_types::error::PluginError;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::debug;

/// Built-in `git` plugin.
///
/// Actions:
/// - `add` { repo_dir, paths: [..] } -- stage paths
/// - `commit` { repo_dir, message } -- commit staged changes
pub struct GitPlugin;

impl GitPlugin {
    async fn dispatch(&self, action: &str, params: &Value) -> Result<Value, PluginError> {
        match action {
            "add" => {
                let repo_dir = require_str(params, "repo_dir")?;
                let paths: Vec<&str> = params["paths"]
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                if paths.is_empty() {
                    return Err(PluginError::InvalidParams(
                        "missing non-empty array param 'paths'".to_string(),
                    ));
                }
                debug!(repo_dir, ?paths, "git.add");
                run_git(repo_dir, &["add", "--"], &paths).await?;
                Ok(json!({ "staged": paths }))
            }
            "commit" => {
                let repo_dir = require_str(params, "repo_dir")?;
                let message = require_str(params, "message")?;
                debug!(repo_dir, "git.commit");
                let output = run_git(repo_dir, &["commit", "-m", message], &[]).await?;
                Ok(json!({ "message": message, "output": output }))
            }
            other => Err(PluginError::ActionNotFound {
                plugin: "git".to_string(),
                action: other.to_string(),
            }),
        }
    }
}

impl Plugin for GitPlugin {
    fn name(&self) -> &str {
        "git"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["vcs".to_string()]
    }

    fn invoke<'a>(
        &'a self,
        action: &'a str,
        params: &'a Value,
    ) -> BoxFuture<'a, Result<Value, PluginError>> {
        Box::pin(self.dispatch(action, params))
    }
}

async fn run_git(repo_dir: &str, args: &[&str], extra: &[&str]) -> Result<String, PluginError> {
    let output = Command::new("git")
        .args(args)
        .args(extra)
        .current_dir(repo_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PluginError::InvocationFailed(format!("spawning git: {e}")))?;
    if !output.status.success() {
        return Err(PluginError::InvocationFailed(format!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, PluginError> {
    params[field]
        .as_str()
        .ok_or_else(|| PluginError::InvalidParams(format!("missing string param '{field}'")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
