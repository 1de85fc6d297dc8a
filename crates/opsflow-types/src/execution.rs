//! Execution tracking types: run status, per-step results, and the persisted
//! execution record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Terminal-state machine of a workflow run.
///
/// `Running` is the initial state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// The outcome of running one step.
///
/// Every failure mode -- non-zero exit, plugin error, timeout, unmet
/// dependency -- surfaces here as `success: false` with an `error` message,
/// never as an escaping error from the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    /// Step output payload (command stdout/exit data, plugin result,
    /// aggregated sub-results for template and conditional steps).
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Variables extracted by the step, merged into the run context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, Value>>,
}

impl StepResult {
    /// Build a failed result with an error message and no output.
    pub fn failure(step_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            output: Value::Null,
            error: Some(error.into()),
            duration_ms,
            variables: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// Persisted snapshot of a workflow run.
///
/// Written to the snapshot store after every step (best-effort) and at the
/// terminal state. `step_results` preserves completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub workflow_version: String,
    pub status: ExecutionStatus,
    pub dry_run: bool,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub step_results: IndexMap<String, StepResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_terminality() {
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::RolledBack.is_terminal());
    }

    #[test]
    fn step_results_preserve_insertion_order() {
        let mut results: IndexMap<String, StepResult> = IndexMap::new();
        for id in ["c", "a", "b"] {
            results.insert(
                id.to_string(),
                StepResult {
                    step_id: id.to_string(),
                    success: true,
                    output: json!({}),
                    error: None,
                    duration_ms: 1,
                    variables: None,
                },
            );
        }
        let order: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        // Order survives a JSON round-trip (the snapshot path).
        let json_str = serde_json::to_string(&results).unwrap();
        let restored: IndexMap<String, StepResult> = serde_json::from_str(&json_str).unwrap();
        let order: Vec<&str> = restored.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn failure_helper_sets_error() {
        let r = StepResult::failure("deploy", "exit status 1", 42);
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("exit status 1"));
        assert_eq!(r.output, Value::Null);
    }
}
