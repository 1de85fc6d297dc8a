//! The workflow executor.
//!
//! Drives a run end to end: input validation, deterministic ordering,
//! sequential step execution with dependency gating, failure-policy
//! dispatch, rollback, output extraction, and best-effort snapshots.
//! Step-level problems never escape as errors; they land in the result
//! with a terminal status. Only structural problems (a cyclic or
//! unresolvable requires-graph) return `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexMap;
use opsflow_types::execution::{ExecutionStatus, StepResult};
use opsflow_types::workflow::{FailurePolicy, InputSpec, InputType, Step, WorkflowDefinition};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{EXECUTION_TTL_SECS, SnapshotStore, execution_key};

use super::context::ExecutionContext;
use super::definition::WorkflowError;
use super::interpolate::lookup_path;
use super::order::execution_order;
use super::rollback::RollbackManager;
use super::step_runner::StepRunner;

/// Structural failures that make a workflow unrunnable.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("workflow is not executable: {0}")]
    NotExecutable(#[from] WorkflowError),
}

/// Outcome of one workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub outputs: HashMap<String, Value>,
    /// Per-step results in completion order.
    pub step_results: IndexMap<String, StepResult>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Runs workflows sequentially in dependency order.
pub struct WorkflowExecutor<S: SnapshotStore> {
    runner: Arc<StepRunner>,
    rollbacks: Arc<RollbackManager>,
    store: Arc<S>,
    /// Live cancellation tokens, keyed by execution id.
    cancellations: DashMap<Uuid, CancellationToken>,
}

impl<S: SnapshotStore> WorkflowExecutor<S> {
    pub fn new(runner: Arc<StepRunner>, rollbacks: Arc<RollbackManager>, store: Arc<S>) -> Self {
        Self {
            runner,
            rollbacks,
            store,
            cancellations: DashMap::new(),
        }
    }

    /// Request cooperative cancellation of a running execution.
    ///
    /// Takes effect between steps; the in-flight step finishes first.
    /// Returns false when the execution is not currently running.
    pub fn cancel(&self, execution_id: &Uuid) -> bool {
        match self.cancellations.get(execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run a workflow to a terminal state.
    pub async fn execute(
        &self,
        workflow: WorkflowDefinition,
        inputs: HashMap<String, Value>,
        dry_run: bool,
    ) -> Result<ExecutionResult, ExecutorError> {
        let order = execution_order(&workflow.steps)?;
        let start = Instant::now();

        let workflow = Arc::new(workflow);
        let mut ctx = match resolve_inputs(&workflow.inputs, inputs) {
            Ok(resolved) => ExecutionContext::new(workflow.clone(), resolved, dry_run),
            Err(message) => {
                // Fail fast: no steps run on bad inputs.
                let mut ctx = ExecutionContext::new(workflow.clone(), HashMap::new(), dry_run);
                ctx.status = ExecutionStatus::Failed;
                self.snapshot(&ctx, Some(message.clone())).await;
                return Ok(ExecutionResult {
                    execution_id: ctx.execution_id,
                    status: ExecutionStatus::Failed,
                    outputs: HashMap::new(),
                    step_results: IndexMap::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(message),
                });
            }
        };

        let token = CancellationToken::new();
        self.cancellations.insert(ctx.execution_id, token.clone());
        info!(
            execution_id = %ctx.execution_id,
            workflow = %ctx.workflow.name,
            dry_run,
            steps = order.len(),
            "starting execution"
        );

        let steps_by_id: HashMap<&str, &Step> = workflow
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        let mut run_error: Option<String> = None;
        for step_id in &order {
            if token.is_cancelled() {
                ctx.status = ExecutionStatus::Failed;
                run_error = Some("execution cancelled".to_string());
                break;
            }
            // Order ids come from the step list, so the lookup holds.
            let Some(step) = steps_by_id.get(step_id.as_str()) else {
                continue;
            };

            let result = match unmet_dependency(step, &ctx) {
                Some(dep) => StepResult::failure(
                    step_id,
                    format!("dependency '{dep}' did not succeed"),
                    0,
                ),
                None => self.runner.run(step, &ctx).await,
            };

            if let Some(vars) = &result.variables {
                ctx.merge_variables(vars);
            }
            let succeeded = result.success;
            let error = result.error.clone();
            ctx.record_result(result);
            self.snapshot(&ctx, None).await;

            if succeeded {
                continue;
            }
            let message = error.unwrap_or_else(|| format!("step '{step_id}' failed"));
            warn!(
                execution_id = %ctx.execution_id,
                step_id = %step_id,
                policy = ?step.on_failure,
                error = %message,
                "step failed"
            );
            match step.on_failure {
                // The failure stays visible in step_results; the run goes on.
                FailurePolicy::Continue => {}
                FailurePolicy::Abort => {
                    ctx.status = ExecutionStatus::Failed;
                    run_error = Some(message);
                    break;
                }
                FailurePolicy::Rollback => {
                    let report = self.rollbacks.rollback(&ctx).await;
                    info!(
                        execution_id = %ctx.execution_id,
                        actions = report.actions_rolled_back,
                        clean = report.success,
                        "rollback finished"
                    );
                    if report.success {
                        ctx.status = ExecutionStatus::RolledBack;
                        run_error = Some(message);
                    } else {
                        ctx.status = ExecutionStatus::Failed;
                        run_error = Some(format!(
                            "{message}; rollback failed: {}",
                            report.errors.join("; ")
                        ));
                    }
                    break;
                }
            }
        }

        // Exhausting the order without abort or rollback completes the run,
        // even when continue-policy steps failed along the way.
        if !ctx.status.is_terminal() {
            ctx.status = ExecutionStatus::Completed;
        }

        // Auto-rollback compensates an aborted run but the run stays Failed.
        if ctx.status == ExecutionStatus::Failed && workflow.auto_rollback() {
            let report = self.rollbacks.rollback(&ctx).await;
            info!(
                execution_id = %ctx.execution_id,
                actions = report.actions_rolled_back,
                clean = report.success,
                "auto-rollback finished"
            );
        }

        if ctx.status == ExecutionStatus::Completed {
            ctx.outputs = extract_outputs(&workflow, &ctx);
        }
        // Anything rollback did not consume must not outlive the run.
        self.rollbacks.discard(&ctx.execution_id);

        self.snapshot(&ctx, run_error.clone()).await;
        self.cancellations.remove(&ctx.execution_id);
        info!(
            execution_id = %ctx.execution_id,
            status = ?ctx.status,
            steps_run = ctx.step_results.len(),
            "execution finished"
        );

        Ok(ExecutionResult {
            execution_id: ctx.execution_id,
            status: ctx.status,
            outputs: ctx.outputs.clone(),
            step_results: ctx.step_results.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: run_error,
        })
    }

    /// Persist the current context best-effort. Storage problems are logged,
    /// never propagated.
    async fn snapshot(&self, ctx: &ExecutionContext, error: Option<String>) {
        let completed_at = ctx.status.is_terminal().then(Utc::now);
        let record = ctx.snapshot_record(completed_at, error);
        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!(execution_id = %ctx.execution_id, error = %e, "snapshot serialization failed");
                return;
            }
        };
        if let Err(e) = self
            .store
            .put(
                &execution_key(&ctx.execution_id),
                value,
                Some(EXECUTION_TTL_SECS),
            )
            .await
        {
            warn!(execution_id = %ctx.execution_id, error = %e, "snapshot write failed");
        }
    }
}

/// First unmet dependency of a step, if any.
fn unmet_dependency<'a>(step: &'a Step, ctx: &ExecutionContext) -> Option<&'a str> {
    step.requires
        .iter()
        .find(|dep| !ctx.step_succeeded(dep))
        .map(String::as_str)
}

/// Apply defaults and type-check caller inputs. Returns the resolved input
/// map or the first validation failure.
fn resolve_inputs(
    specs: &[InputSpec],
    mut provided: HashMap<String, Value>,
) -> Result<HashMap<String, Value>, String> {
    let mut resolved = HashMap::new();
    for spec in specs {
        let value = match provided.remove(&spec.name) {
            Some(v) => v,
            None => match &spec.default {
                Some(d) => d.clone(),
                None if spec.required => {
                    return Err(format!("missing required input '{}'", spec.name));
                }
                None => continue,
            },
        };
        check_input_type(spec, &value)?;
        resolved.insert(spec.name.clone(), value);
    }
    // Undeclared extras pass through untouched.
    resolved.extend(provided);
    Ok(resolved)
}

fn check_input_type(spec: &InputSpec, value: &Value) -> Result<(), String> {
    let ok = match spec.input_type {
        InputType::String => value.is_string(),
        InputType::Number => value.is_number(),
        InputType::Boolean => value.is_boolean(),
        InputType::Array => value.is_array(),
        InputType::Object => value.is_object(),
        InputType::Enum => match value.as_str() {
            Some(s) => spec
                .values
                .as_ref()
                .is_some_and(|allowed| allowed.iter().any(|v| v == s)),
            None => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "input '{}' does not match declared type {:?}",
            spec.name, spec.input_type
        ))
    }
}

/// Extract declared outputs from step results. An unresolvable path yields
/// null with a warning rather than failing a completed run.
fn extract_outputs(
    workflow: &WorkflowDefinition,
    ctx: &ExecutionContext,
) -> HashMap<String, Value> {
    let mut outputs = HashMap::new();
    for spec in &workflow.outputs {
        let value = ctx
            .step_results
            .get(&spec.step)
            .and_then(|result| lookup_path(&result.output, &spec.path))
            .cloned();
        match value {
            Some(v) => {
                outputs.insert(spec.name.clone(), v);
            }
            None => {
                warn!(
                    output = %spec.name,
                    step = %spec.step,
                    path = %spec.path,
                    "output path did not resolve"
                );
                outputs.insert(spec.name.clone(), Value::Null);
            }
        }
    }
    outputs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
