//! Workflow domain types for Opsflow.
//!
//! Defines the canonical representation for declarative workflows: a named,
//! versioned set of steps with typed inputs, extracted outputs, and per-step
//! failure policy. YAML and JSON documents both deserialize into
//! `WorkflowDefinition`; it is the single source of truth for a workflow's
//! shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// The canonical workflow definition.
///
/// Structural invariants (unique step ids, resolvable `requires` references,
/// an acyclic requires-graph, unique input names) are checked by the
/// validator in `opsflow-core`, not enforced by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name (alphanumeric, hyphens, underscores).
    pub name: String,
    /// Version string in `major.minor` form (e.g. "1.0").
    pub version: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered list of declared inputs.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Ordered list of step definitions forming the requires-graph.
    pub steps: Vec<Step>,
    /// Values extracted from step results when the run completes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,
    /// Extensible metadata (e.g. `auto_rollback: true`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl WorkflowDefinition {
    /// Whether `metadata.auto_rollback` is set to `true`.
    pub fn auto_rollback(&self) -> bool {
        self.metadata
            .get("auto_rollback")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single step in a workflow.
///
/// The step kind and its kind-specific fields live in the flattened
/// [`StepConfig`] union, tagged by `type` in the document:
///
/// ```yaml
/// - id: scaffold
///   type: command
///   command: mkdir -p ${project_dir}
///   on_failure: rollback
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// User-defined step ID, unique within a workflow.
    pub id: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What to do when this step fails.
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Step-level timeout in seconds. The executor defaults to 300.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Step IDs this step requires (edges of the requires-graph).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Kind-specific configuration, tagged by `type`.
    #[serde(flatten)]
    pub config: StepConfig,
}

/// Kind-specific step configuration.
///
/// One variant per step kind, each carrying only its relevant fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Run a shell command as a subprocess.
    Command {
        /// Command text, subject to `${...}` interpolation.
        command: String,
        /// Working directory, subject to interpolation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<String>,
        /// Extra environment variables merged over the parent environment.
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
        /// Post-hoc variable extraction rules applied to stdout.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extract: Vec<VariableExtraction>,
        /// Explicit compensating command. Takes precedence over the
        /// heuristic suggestion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rollback_command: Option<String>,
    },
    /// Invoke a named action on a registered plugin.
    PluginAction {
        plugin: String,
        action: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        params: HashMap<String, Value>,
        /// Declared compensating action on the same plugin.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rollback_action: Option<RollbackSpec>,
    },
    /// Expand a named reusable step sequence from the template library.
    Template {
        template: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        variables: HashMap<String, Value>,
    },
    /// Evaluate a condition and run the matching nested step list.
    Conditional {
        condition: String,
        #[serde(default)]
        then_steps: Vec<Step>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        else_steps: Vec<Step>,
    },
}

impl StepConfig {
    /// Short kind name for logs and result payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Command { .. } => "command",
            StepConfig::PluginAction { .. } => "plugin_action",
            StepConfig::Template { .. } => "template",
            StepConfig::Conditional { .. } => "conditional",
        }
    }
}

/// Declared compensating plugin action for a `plugin_action` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackSpec {
    pub action: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Value>,
}

/// What the executor does when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and mark it failed.
    #[default]
    Abort,
    /// Record the failure and keep scheduling independent steps.
    Continue,
    /// Reverse recorded compensating actions, then stop.
    Rollback,
}

/// Post-hoc variable extraction rule for command steps.
///
/// Exactly one of `json_path` (dot path over JSON stdout) or `regex`
/// (first capture group over raw stdout) should be set; the validator
/// rejects rules with neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableExtraction {
    /// Variable name to bind.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Declared type of a workflow input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Enum,
}

/// A declared workflow input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input name, unique within a workflow.
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    /// Default value applied when the caller omits the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values, meaningful only for `type: enum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// A value extracted from a step result when the run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output name.
    pub name: String,
    /// Source step ID.
    pub step: String,
    /// Dot path into the source step's output payload (e.g. "stdout" or
    /// "report.url"). Empty path selects the whole payload.
    #[serde(default)]
    pub path: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_realistic_yaml_workflow() {
        let yaml = r#"
name: scaffold-service
version: "1.2"
description: Scaffold a service directory and commit it
inputs:
  - name: project_dir
    type: string
    required: true
  - name: license
    type: enum
    required: false
    default: mit
    values: [mit, apache]
steps:
  - id: make-dir
    type: command
    command: mkdir -p ${project_dir}
    on_failure: rollback
    rollback_command: rmdir ${project_dir}
  - id: git-add
    type: command
    command: git add ${project_dir}
    requires: [make-dir]
    timeout_secs: 60
  - id: notify
    type: plugin_action
    plugin: chat
    action: post_message
    params:
      text: "scaffolded ${project_dir}"
    requires: [git-add]
outputs:
  - name: created_dir
    step: make-dir
    path: stdout
metadata:
  auto_rollback: true
"#;
        let def: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.name, "scaffold-service");
        assert_eq!(def.version, "1.2");
        assert_eq!(def.inputs.len(), 2);
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.steps[1].requires, vec!["make-dir"]);
        assert_eq!(def.steps[1].timeout_secs, Some(60));
        assert_eq!(def.steps[0].on_failure, FailurePolicy::Rollback);
        assert_eq!(def.steps[2].on_failure, FailurePolicy::Abort);
        assert!(def.auto_rollback());
        assert!(matches!(
            &def.steps[2].config,
            StepConfig::PluginAction { plugin, .. } if plugin == "chat"
        ));
        assert_eq!(def.outputs[0].path, "stdout");
        assert_eq!(def.inputs[1].input_type, InputType::Enum);
        assert_eq!(def.inputs[1].default, Some(json!("mit")));
    }

    #[test]
    fn conditional_step_nests_step_lists() {
        let yaml = r#"
id: check-env
type: conditional
condition: "${env} == production"
then_steps:
  - id: deploy
    type: command
    command: ./deploy.sh
else_steps:
  - id: dry
    type: command
    command: echo skipping deploy
"#;
        let step: Step = serde_yaml_ng::from_str(yaml).unwrap();
        match &step.config {
            StepConfig::Conditional {
                then_steps,
                else_steps,
                ..
            } => {
                assert_eq!(then_steps.len(), 1);
                assert_eq!(else_steps.len(), 1);
                assert_eq!(then_steps[0].id, "deploy");
            }
            other => panic!("expected conditional, got {}", other.kind()),
        }
    }

    #[test]
    fn step_config_json_tagging() {
        let step = Step {
            id: "t".to_string(),
            description: None,
            on_failure: FailurePolicy::Continue,
            timeout_secs: None,
            requires: vec![],
            config: StepConfig::Template {
                template: "rust-service".to_string(),
                variables: HashMap::from([("name".to_string(), json!("api"))]),
            },
        };
        let json_str = serde_json::to_string(&step).unwrap();
        assert!(json_str.contains("\"type\":\"template\""));
        let parsed: Step = serde_json::from_str(&json_str).unwrap();
        assert!(matches!(parsed.config, StepConfig::Template { .. }));
        assert_eq!(parsed.on_failure, FailurePolicy::Continue);
    }

    #[test]
    fn auto_rollback_defaults_false() {
        let def = WorkflowDefinition {
            name: "x".to_string(),
            version: "1.0".to_string(),
            description: None,
            inputs: vec![],
            steps: vec![],
            outputs: vec![],
            metadata: HashMap::new(),
        };
        assert!(!def.auto_rollback());
    }
}
