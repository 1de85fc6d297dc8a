//! Runs individual steps.
//!
//! The runner is infallible from the executor's point of view: every failure
//! mode (non-zero exit, plugin error, unknown template, timeout, spawn
//! failure) lands in the returned `StepResult` with `success: false`. Each
//! step runs under a timeout, 300 seconds unless the step declares one.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use opsflow_types::execution::StepResult;
use opsflow_types::rollback::RollbackActionKind;
use opsflow_types::workflow::{RollbackSpec, Step, StepConfig, VariableExtraction};
use regex::Regex;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::plugin::PluginRegistry;

use super::condition::evaluate_condition;
use super::context::ExecutionContext;
use super::interpolate::{interpolate, interpolate_value, lookup_path};
use super::rollback::{RollbackManager, command_rollback_data, suggest_rollback_command};
use super::templates::TemplateLibrary;

/// Applied when a step declares no `timeout_secs`.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Executes one step of any kind against a run context.
pub struct StepRunner {
    plugins: Arc<PluginRegistry>,
    templates: Arc<dyn TemplateLibrary>,
    rollbacks: Arc<RollbackManager>,
}

impl StepRunner {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        templates: Arc<dyn TemplateLibrary>,
        rollbacks: Arc<RollbackManager>,
    ) -> Self {
        Self {
            plugins,
            templates,
            rollbacks,
        }
    }

    /// Run a step to completion, enforcing its timeout.
    ///
    /// Boxed because template and conditional steps recurse into nested
    /// step lists.
    pub fn run<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            let start = Instant::now();
            let timeout_secs = step.timeout_secs.unwrap_or(DEFAULT_STEP_TIMEOUT_SECS);
            debug!(step_id = %step.id, kind = step.config.kind(), "running step");

            match tokio::time::timeout(
                Duration::from_secs(timeout_secs),
                self.dispatch(step, ctx, start),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => StepResult::failure(
                    &step.id,
                    format!("step timed out after {timeout_secs}s"),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }

    async fn dispatch(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
        start: Instant,
    ) -> StepResult {
        match &step.config {
            StepConfig::Command {
                command,
                working_dir,
                env,
                extract,
                rollback_command,
            } => {
                self.run_command(
                    step,
                    command,
                    working_dir.as_deref(),
                    env,
                    extract,
                    rollback_command.as_deref(),
                    ctx,
                    start,
                )
                .await
            }
            StepConfig::PluginAction {
                plugin,
                action,
                params,
                rollback_action,
            } => {
                self.run_plugin_action(
                    step,
                    plugin,
                    action,
                    params,
                    rollback_action.as_ref(),
                    ctx,
                    start,
                )
                .await
            }
            StepConfig::Template {
                template,
                variables,
            } => self.run_template(step, template, variables, ctx, start).await,
            StepConfig::Conditional {
                condition,
                then_steps,
                else_steps,
            } => {
                self.run_conditional(step, condition, then_steps, else_steps, ctx, start)
                    .await
            }
        }
    }

    // ---- command steps ----

    #[allow(clippy::too_many_arguments)]
    async fn run_command(
        &self,
        step: &Step,
        command: &str,
        working_dir: Option<&str>,
        env: &HashMap<String, String>,
        extract: &[VariableExtraction],
        rollback_command: Option<&str>,
        ctx: &ExecutionContext,
        start: Instant,
    ) -> StepResult {
        let scope = ctx.interpolation_scope();
        let command = interpolate(command, &scope);
        let working_dir = working_dir.map(|d| interpolate(d, &scope));

        if ctx.dry_run {
            return StepResult {
                step_id: step.id.clone(),
                success: true,
                output: json!({ "dry_run": true, "command": command }),
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
                variables: None,
            };
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The timeout drops this future; the child must die with it.
            .kill_on_drop(true);
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }
        for (name, value) in env {
            cmd.env(name, interpolate(value, &scope));
        }

        let output = match cmd.output().await {
            Ok(out) => out,
            Err(e) => {
                return StepResult::failure(
                    &step.id,
                    format!("failed to spawn command: {e}"),
                    start.elapsed().as_millis() as u64,
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string();
        let stderr = String::from_utf8_lossy(&output.stderr)
            .trim_end()
            .to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        let success = output.status.success();

        let variables = if success && !extract.is_empty() {
            Some(extract_variables(&step.id, &stdout, extract))
        } else {
            None
        };

        if success {
            self.record_command_rollback(step, rollback_command, &command, working_dir.as_deref(), ctx, &scope);
        }

        StepResult {
            step_id: step.id.clone(),
            success,
            output: json!({ "stdout": stdout, "stderr": stderr, "exit_code": exit_code }),
            error: (!success).then(|| format!("command exited with code {exit_code}")),
            duration_ms: start.elapsed().as_millis() as u64,
            variables,
        }
    }

    fn record_command_rollback(
        &self,
        step: &Step,
        declared: Option<&str>,
        command: &str,
        working_dir: Option<&str>,
        ctx: &ExecutionContext,
        scope: &HashMap<String, Value>,
    ) {
        // A declared rollback_command wins over the heuristic suggestion.
        let compensation = match declared {
            Some(text) => Some(interpolate(text, scope)),
            None => suggest_rollback_command(command),
        };
        if let Some(compensation) = compensation {
            self.rollbacks.record_action(
                ctx.execution_id,
                &step.id,
                RollbackActionKind::Command,
                format!("undo '{command}'"),
                command_rollback_data(&compensation, working_dir),
            );
        }
    }

    // ---- plugin steps ----

    #[allow(clippy::too_many_arguments)]
    async fn run_plugin_action(
        &self,
        step: &Step,
        plugin_name: &str,
        action: &str,
        params: &HashMap<String, Value>,
        rollback_action: Option<&RollbackSpec>,
        ctx: &ExecutionContext,
        start: Instant,
    ) -> StepResult {
        let scope = ctx.interpolation_scope();
        let params = interpolate_value(&json!(params), &scope);

        let plugin = match self.plugins.resolve(plugin_name) {
            Ok(p) => p,
            Err(e) => {
                return StepResult::failure(
                    &step.id,
                    e.to_string(),
                    start.elapsed().as_millis() as u64,
                );
            }
        };

        // Dry run still resolves the plugin so a bad reference surfaces.
        if ctx.dry_run {
            return StepResult {
                step_id: step.id.clone(),
                success: true,
                output: json!({ "dry_run": true, "plugin": plugin_name, "action": action }),
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
                variables: None,
            };
        }

        match plugin.invoke(action, &params).await {
            Ok(output) => {
                if let Some(spec) = rollback_action {
                    let rollback_params = interpolate_value(&json!(spec.params), &scope);
                    self.rollbacks.record_action(
                        ctx.execution_id,
                        &step.id,
                        RollbackActionKind::PluginAction,
                        format!("undo {plugin_name}.{action} via {}", spec.action),
                        json!({
                            "plugin": plugin_name,
                            "action": spec.action,
                            "params": rollback_params,
                        }),
                    );
                }
                StepResult {
                    step_id: step.id.clone(),
                    success: true,
                    output,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    variables: None,
                }
            }
            Err(e) => StepResult::failure(
                &step.id,
                e.to_string(),
                start.elapsed().as_millis() as u64,
            ),
        }
    }

    // ---- template steps ----

    async fn run_template(
        &self,
        step: &Step,
        template: &str,
        variables: &HashMap<String, Value>,
        ctx: &ExecutionContext,
        start: Instant,
    ) -> StepResult {
        let Some(sub_steps) = self.templates.resolve(template) else {
            return StepResult::failure(
                &step.id,
                format!("unknown template '{template}'"),
                start.elapsed().as_millis() as u64,
            );
        };

        // Sub-steps run against a scratch copy so template variables and
        // intermediate outputs stay scoped to the expansion.
        let mut scratch = ctx.clone();
        let scope = ctx.interpolation_scope();
        for (name, value) in variables {
            scratch
                .variables
                .insert(name.clone(), interpolate_value(value, &scope));
        }

        let mut results: Vec<StepResult> = Vec::with_capacity(sub_steps.len());
        let mut collected: HashMap<String, Value> = HashMap::new();
        for sub in &sub_steps {
            let mut namespaced = sub.clone();
            namespaced.id = format!("{}_{}", step.id, sub.id);
            let result = self.run(&namespaced, &scratch).await;
            if let Some(vars) = &result.variables {
                scratch.merge_variables(vars);
                collected.extend(vars.clone());
            }
            let failed = !result.success;
            let error = result.error.clone();
            scratch.record_result(result.clone());
            results.push(result);
            if failed {
                return StepResult {
                    step_id: step.id.clone(),
                    success: false,
                    output: json!({ "template": template, "results": results }),
                    error: error
                        .map(|e| format!("template '{template}' failed: {e}")),
                    duration_ms: start.elapsed().as_millis() as u64,
                    variables: (!collected.is_empty()).then_some(collected),
                };
            }
        }

        StepResult {
            step_id: step.id.clone(),
            success: true,
            output: json!({ "template": template, "results": results }),
            error: None,
            duration_ms: start.elapsed().as_millis() as u64,
            variables: (!collected.is_empty()).then_some(collected),
        }
    }

    // ---- conditional steps ----

    async fn run_conditional(
        &self,
        step: &Step,
        condition: &str,
        then_steps: &[Step],
        else_steps: &[Step],
        ctx: &ExecutionContext,
        start: Instant,
    ) -> StepResult {
        let scope = ctx.interpolation_scope();
        let text = interpolate(condition, &scope);
        let outcome = evaluate_condition(&text);
        let (branch, chosen) = if outcome {
            ("then", then_steps)
        } else {
            ("else", else_steps)
        };
        debug!(step_id = %step.id, condition = %text, branch, "evaluated condition");

        let mut scratch = ctx.clone();
        let mut results: Vec<StepResult> = Vec::with_capacity(chosen.len());
        let mut collected: HashMap<String, Value> = HashMap::new();
        for sub in chosen {
            let result = self.run(sub, &scratch).await;
            if let Some(vars) = &result.variables {
                scratch.merge_variables(vars);
                collected.extend(vars.clone());
            }
            let failed = !result.success;
            let error = result.error.clone();
            scratch.record_result(result.clone());
            results.push(result);
            if failed {
                return StepResult {
                    step_id: step.id.clone(),
                    success: false,
                    output: json!({
                        "condition": text,
                        "result": outcome,
                        "branch": branch,
                        "results": results,
                    }),
                    error: error.map(|e| format!("{branch} branch failed: {e}")),
                    duration_ms: start.elapsed().as_millis() as u64,
                    variables: (!collected.is_empty()).then_some(collected),
                };
            }
        }

        StepResult {
            step_id: step.id.clone(),
            success: true,
            output: json!({
                "condition": text,
                "result": outcome,
                "branch": branch,
                "results": results,
            }),
            error: None,
            duration_ms: start.elapsed().as_millis() as u64,
            variables: (!collected.is_empty()).then_some(collected),
        }
    }
}

/// Apply extraction rules to command stdout. A rule that fails to match is
/// skipped with a warning rather than failing the step.
fn extract_variables(
    step_id: &str,
    stdout: &str,
    rules: &[VariableExtraction],
) -> HashMap<String, Value> {
    let mut variables = HashMap::new();
    for rule in rules {
        let extracted = if let Some(path) = &rule.json_path {
            serde_json::from_str::<Value>(stdout)
                .ok()
                .and_then(|parsed| lookup_path(&parsed, path).cloned())
        } else if let Some(pattern) = &rule.regex {
            match Regex::new(pattern) {
                Ok(re) => re
                    .captures(stdout)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                    .map(|m| Value::String(m.as_str().to_string())),
                Err(e) => {
                    warn!(step_id, rule = %rule.name, error = %e, "invalid extraction regex");
                    None
                }
            }
        } else {
            None
        };

        match extracted {
            Some(value) => {
                variables.insert(rule.name.clone(), value);
            }
            None => {
                warn!(step_id, rule = %rule.name, "extraction rule matched nothing");
            }
        }
    }
    variables
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
