//! Per-run execution context.
//!
//! `ExecutionContext` is owned exclusively by its run: created when
//! `execute()` starts, mutated only by the owning run's step loop, and
//! persisted at the terminal state. It tracks resolved inputs, accumulated
//! outputs, completion-ordered step results, and the mutable variables map
//! that interpolation draws from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use opsflow_types::execution::{ExecutionRecord, ExecutionStatus, StepResult};
use opsflow_types::workflow::WorkflowDefinition;
use serde_json::Value;
use uuid::Uuid;

/// Mutable state for one workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Read-only workflow reference shared with the executor.
    pub workflow: Arc<WorkflowDefinition>,
    /// UUIDv7 execution id, assigned at run start.
    pub execution_id: Uuid,
    /// Inputs after defaults were applied and types checked.
    pub inputs: HashMap<String, Value>,
    /// Outputs extracted when the run completes.
    pub outputs: HashMap<String, Value>,
    /// Step results in completion order.
    pub step_results: IndexMap<String, StepResult>,
    pub status: ExecutionStatus,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    /// Variables extracted by steps, available to later interpolation.
    pub variables: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create the context for a fresh run. Status starts as `Running`.
    pub fn new(
        workflow: Arc<WorkflowDefinition>,
        inputs: HashMap<String, Value>,
        dry_run: bool,
    ) -> Self {
        Self {
            workflow,
            execution_id: Uuid::now_v7(),
            inputs,
            outputs: HashMap::new(),
            step_results: IndexMap::new(),
            status: ExecutionStatus::Running,
            dry_run,
            started_at: Utc::now(),
            variables: HashMap::new(),
        }
    }

    /// Record a step result, preserving completion order.
    pub fn record_result(&mut self, result: StepResult) {
        self.step_results.insert(result.step_id.clone(), result);
    }

    /// Whether a step has completed successfully in this run.
    pub fn step_succeeded(&self, step_id: &str) -> bool {
        self.step_results
            .get(step_id)
            .is_some_and(|r| r.success)
    }

    /// Merge extracted variables into the context. Later writes win.
    pub fn merge_variables(&mut self, variables: &HashMap<String, Value>) {
        for (name, value) in variables {
            self.variables.insert(name.clone(), value.clone());
        }
    }

    /// The flattened view interpolation substitutes from: inputs, then
    /// variables (shadowing inputs of the same name), then
    /// `step.<id>.output` entries for every recorded result.
    pub fn interpolation_scope(&self) -> HashMap<String, Value> {
        let mut scope = self.inputs.clone();
        for (name, value) in &self.variables {
            scope.insert(name.clone(), value.clone());
        }
        for (id, result) in &self.step_results {
            scope.insert(format!("step.{id}.output"), result.output.clone());
        }
        scope
    }

    /// Build the persisted snapshot of this run's current state.
    pub fn snapshot_record(&self, completed_at: Option<DateTime<Utc>>, error: Option<String>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: self.execution_id,
            workflow_name: self.workflow.name.clone(),
            workflow_version: self.workflow.version.clone(),
            status: self.status,
            dry_run: self.dry_run,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            step_results: self.step_results.clone(),
            started_at: self.started_at,
            completed_at,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
