//! End-to-end engine scenarios: parse a YAML workflow, execute it against
//! the real filesystem, and check terminal state, results, and rollback.

use std::collections::HashMap;
use std::sync::Arc;

use opsflow_core::plugin::PluginRegistry;
use opsflow_core::storage::{EXECUTION_PREFIX, NullStore, SnapshotStore};
use opsflow_core::workflow::definition::parse_workflow_yaml;
use opsflow_core::workflow::executor::WorkflowExecutor;
use opsflow_core::workflow::rollback::RollbackManager;
use opsflow_core::workflow::step_runner::StepRunner;
use opsflow_core::workflow::templates::{NoTemplates, TemplateLibrary};
use opsflow_core::workflow::validator::Validator;
use opsflow_types::error::StoreError;
use opsflow_types::execution::ExecutionStatus;
use opsflow_types::workflow::Step;
use serde_json::{Value, json};

fn executor() -> WorkflowExecutor<NullStore> {
    executor_with_templates(Arc::new(NoTemplates))
}

fn executor_with_templates(templates: Arc<dyn TemplateLibrary>) -> WorkflowExecutor<NullStore> {
    let plugins = Arc::new(PluginRegistry::new());
    let rollbacks = Arc::new(RollbackManager::new(plugins.clone()));
    let runner = Arc::new(StepRunner::new(plugins, templates, rollbacks.clone()));
    WorkflowExecutor::new(runner, rollbacks, Arc::new(NullStore))
}

fn inputs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Scaffold scenario: real filesystem side effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scaffold_workflow_creates_files_and_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();

    let yaml = r#"
name: scaffold
version: "1.0"
inputs:
  - name: root
    type: string
    required: true
steps:
  - id: make-dir
    type: command
    command: mkdir -p ${root}/project
  - id: add-readme
    type: command
    command: echo hello > ${root}/project/README.md
    requires: [make-dir]
  - id: report
    type: command
    command: ls ${root}/project
    requires: [add-readme]
outputs:
  - name: listing
    step: report
    path: stdout
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    assert!(Validator::default().validate(&workflow).is_valid);

    let result = executor()
        .execute(workflow, inputs(&[("root", json!(root.clone()))]), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(dir.path().join("project/README.md").exists());
    assert_eq!(result.outputs["listing"], json!("README.md"));
    let ids: Vec<&str> = result.step_results.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["make-dir", "add-readme", "report"]);
}

// ---------------------------------------------------------------------------
// Rollback scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_step_with_rollback_policy_reverses_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();

    let yaml = r#"
name: deploy
version: "1.0"
inputs:
  - name: root
    type: string
    required: true
steps:
  - id: prepare
    type: command
    command: mkdir ${root}/release
    rollback_command: rmdir ${root}/release
  - id: ship
    type: command
    command: exit 1
    requires: [prepare]
    on_failure: rollback
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, inputs(&[("root", json!(root.clone()))]), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::RolledBack);
    assert!(!dir.path().join("release").exists());
    assert!(!result.step_results["ship"].success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn failed_compensation_leaves_the_run_failed() {
    let yaml = r#"
name: deploy
version: "1.0"
steps:
  - id: prepare
    type: command
    command: echo ready
    rollback_command: "false"
  - id: ship
    type: command
    command: exit 1
    requires: [prepare]
    on_failure: rollback
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    // The compensation itself failed, so the run cannot claim RolledBack.
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("rollback failed"))
    );
}

#[tokio::test]
async fn auto_rollback_compensates_but_run_stays_failed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();

    let yaml = r#"
name: deploy
version: "1.0"
inputs:
  - name: root
    type: string
    required: true
steps:
  - id: prepare
    type: command
    command: mkdir ${root}/staging
    rollback_command: rmdir ${root}/staging
  - id: ship
    type: command
    command: exit 1
    requires: [prepare]
metadata:
  auto_rollback: true
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, inputs(&[("root", json!(root.clone()))]), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(!dir.path().join("staging").exists());
}

#[tokio::test]
async fn aborted_run_discards_recorded_compensations() {
    let plugins = Arc::new(PluginRegistry::new());
    let rollbacks = Arc::new(RollbackManager::new(plugins.clone()));
    let runner = Arc::new(StepRunner::new(
        plugins,
        Arc::new(NoTemplates),
        rollbacks.clone(),
    ));
    let executor = WorkflowExecutor::new(runner, rollbacks.clone(), Arc::new(NullStore));

    let yaml = r#"
name: aborted
version: "1.0"
steps:
  - id: prepare
    type: command
    command: echo ready
    rollback_command: echo undo
  - id: ship
    type: command
    command: exit 1
    requires: [prepare]
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    // No rollback ran, but the recorded actions must not linger.
    assert_eq!(rollbacks.pending(&result.execution_id), 0);
}

// ---------------------------------------------------------------------------
// Conditional scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conditional_branches_follow_the_inputs() {
    let yaml = r#"
name: gated
version: "1.0"
inputs:
  - name: env
    type: string
    required: true
steps:
  - id: gate
    type: conditional
    condition: "${env} == production"
    then_steps:
      - id: real
        type: command
        command: echo deploying
    else_steps:
      - id: pretend
        type: command
        command: echo skipping
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();

    let then_run = executor()
        .execute(
            workflow.clone(),
            inputs(&[("env", json!("production"))]),
            false,
        )
        .await
        .unwrap();
    assert_eq!(then_run.status, ExecutionStatus::Completed);
    assert_eq!(then_run.step_results["gate"].output["branch"], json!("then"));

    let else_run = executor()
        .execute(workflow, inputs(&[("env", json!("staging"))]), false)
        .await
        .unwrap();
    assert_eq!(else_run.step_results["gate"].output["branch"], json!("else"));
}

// ---------------------------------------------------------------------------
// Failure policies and gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abort_leaves_later_steps_unstarted() {
    let yaml = r#"
name: aborting
version: "1.0"
steps:
  - id: first
    type: command
    command: exit 1
  - id: second
    type: command
    command: echo never
    requires: [first]
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.step_results.len(), 1);
    assert!(!result.step_results.contains_key("second"));
}

#[tokio::test]
async fn continue_policy_gates_dependents_but_not_independents() {
    let yaml = r#"
name: resilient
version: "1.0"
steps:
  - id: flaky
    type: command
    command: exit 1
    on_failure: continue
  - id: downstream
    type: command
    command: echo depends
    requires: [flaky]
    on_failure: continue
  - id: independent
    type: command
    command: echo fine
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    // A continue-policy failure does not fail the run; it stays visible in
    // the step results while the rest of the order executes.
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(result.error.is_none());
    assert_eq!(result.step_results.len(), 3);
    assert!(!result.step_results["flaky"].success);
    let downstream = &result.step_results["downstream"];
    assert!(!downstream.success);
    assert!(
        downstream
            .error
            .as_deref()
            .is_some_and(|e| e.contains("flaky"))
    );
    assert!(result.step_results["independent"].success);
}

// ---------------------------------------------------------------------------
// Inputs and dry run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_required_input_fails_before_any_step() {
    let yaml = r#"
name: strict
version: "1.0"
inputs:
  - name: target
    type: string
    required: true
steps:
  - id: run
    type: command
    command: echo ${target}
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.step_results.is_empty());
    assert!(result.error.as_deref().is_some_and(|e| e.contains("target")));
}

#[tokio::test]
async fn dry_run_completes_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();

    let yaml = r#"
name: scaffold
version: "1.0"
inputs:
  - name: root
    type: string
    required: true
steps:
  - id: make-dir
    type: command
    command: mkdir ${root}/would-exist
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, inputs(&[("root", json!(root.clone()))]), true)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(!dir.path().join("would-exist").exists());
    assert_eq!(
        result.step_results["make-dir"].output["dry_run"],
        json!(true)
    );
}

// ---------------------------------------------------------------------------
// Templates and variables
// ---------------------------------------------------------------------------

struct OneTemplate;

impl TemplateLibrary for OneTemplate {
    fn resolve(&self, name: &str) -> Option<Vec<Step>> {
        if name != "announce" {
            return None;
        }
        let yaml = r#"
- id: banner
  type: command
  command: echo == ${title} ==
- id: body
  type: command
  command: echo ${title} is live
"#;
        serde_yaml_ng::from_str(yaml).ok()
    }

    fn names(&self) -> Vec<String> {
        vec!["announce".to_string()]
    }
}

#[tokio::test]
async fn template_steps_expand_with_namespaced_ids() {
    let yaml = r#"
name: release-notes
version: "1.0"
steps:
  - id: notes
    type: template
    template: announce
    variables:
      title: v2
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor_with_templates(Arc::new(OneTemplate))
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    let notes = &result.step_results["notes"];
    assert_eq!(notes.output["template"], json!("announce"));
    assert_eq!(
        notes.output["results"][0]["step_id"],
        json!("notes_banner")
    );
    assert_eq!(
        notes.output["results"][1]["output"]["stdout"],
        json!("v2 is live")
    );
}

#[tokio::test]
async fn extracted_variables_flow_into_later_steps() {
    let yaml = r#"
name: versioned
version: "1.0"
steps:
  - id: detect
    type: command
    command: echo 'version=1.7.3'
    extract:
      - name: version
        regex: "version=([0-9.]+)"
  - id: announce
    type: command
    command: echo releasing ${version}
    requires: [detect]
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let result = executor()
        .execute(workflow, HashMap::new(), false)
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        result.step_results["announce"].output["stdout"],
        json!("releasing 1.7.3")
    );
}

// ---------------------------------------------------------------------------
// Structural errors and cancellation bookkeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cyclic_requires_graph_is_a_structural_error() {
    let yaml = r#"
name: cyclic
version: "1.0"
steps:
  - id: a
    type: command
    command: echo a
    requires: [b]
  - id: b
    type: command
    command: echo b
    requires: [a]
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    assert!(
        executor()
            .execute(workflow, HashMap::new(), false)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn cancelling_an_unknown_execution_reports_false() {
    assert!(!executor().cancel(&uuid::Uuid::now_v7()));
}

/// Snapshot store that keeps records in memory so a test can observe a run
/// while it is still in flight.
#[derive(Default)]
struct RecordingStore {
    entries: std::sync::Mutex<HashMap<String, Value>>,
}

impl SnapshotStore for RecordingStore {
    async fn put(&self, key: &str, value: Value, _ttl_secs: Option<u64>) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[tokio::test]
async fn cancel_halts_a_live_run_between_steps() {
    let plugins = Arc::new(PluginRegistry::new());
    let rollbacks = Arc::new(RollbackManager::new(plugins.clone()));
    let runner = Arc::new(StepRunner::new(
        plugins,
        Arc::new(NoTemplates),
        rollbacks.clone(),
    ));
    let store = Arc::new(RecordingStore::default());
    let executor = Arc::new(WorkflowExecutor::new(runner, rollbacks, store.clone()));

    let yaml = r#"
name: slow
version: "1.0"
steps:
  - id: first
    type: command
    command: echo started
  - id: second
    type: command
    command: sleep 2
    requires: [first]
  - id: third
    type: command
    command: echo never
    requires: [second]
"#;
    let workflow = parse_workflow_yaml(yaml).unwrap();
    let run = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.execute(workflow, HashMap::new(), false).await })
    };

    // The first snapshot reveals the execution id; cancel as soon as it lands.
    let execution_id = loop {
        let keys = store.scan(EXECUTION_PREFIX).await.unwrap();
        if let Some(key) = keys.first() {
            break key
                .trim_start_matches(EXECUTION_PREFIX)
                .parse::<uuid::Uuid>()
                .unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    };
    assert!(executor.cancel(&execution_id));

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("execution cancelled"));
    assert!(!result.step_results.contains_key("third"));
}
