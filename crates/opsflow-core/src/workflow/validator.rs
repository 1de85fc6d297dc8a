//! Workflow validation: schema, semantic, and safety-policy checks.
//!
//! `Validator::validate` is pure and side-effect free. It never executes a
//! step; it only inspects the definition. The three checks are independent
//! and all of them run even when an earlier one fails, so a single pass
//! reports every problem.

use std::collections::{HashMap, HashSet};

use opsflow_types::workflow::{Step, StepConfig, WorkflowDefinition};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::safety::{CommandDenyList, SafetyChecker};

/// How many steps a workflow can carry before the validator warns.
const LARGE_WORKFLOW_STEPS: usize = 50;

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Outcome of validating a workflow definition.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// True when the schema, semantic, and safety checks all passed.
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates workflow definitions against schema, semantic, and safety rules.
pub struct Validator {
    safety: Box<dyn SafetyChecker>,
}

impl Default for Validator {
    /// A validator with the default command deny-list policy.
    fn default() -> Self {
        Self::new(Box::new(CommandDenyList::default()))
    }
}

impl Validator {
    /// Create a validator with an injected safety policy.
    pub fn new(safety: Box<dyn SafetyChecker>) -> Self {
        Self { safety }
    }

    /// Validate a workflow definition. Pure: no side effects, no I/O.
    pub fn validate(&self, def: &WorkflowDefinition) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_schema(def, &mut errors);
        check_semantics(def, &mut errors);

        let safety = self.safety.check(def);
        errors.extend(safety.violations);
        warnings.extend(safety.warnings);

        collect_warnings(def, &mut warnings);

        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Schema check
// ---------------------------------------------------------------------------

fn check_schema(def: &WorkflowDefinition, errors: &mut Vec<String>) {
    if def.name.is_empty() {
        errors.push("workflow name must not be empty".to_string());
    } else if !def
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        errors.push(format!(
            "workflow name '{}' contains invalid characters (alphanumeric, '-', '_' only)",
            def.name
        ));
    }

    if !is_major_minor(&def.version) {
        errors.push(format!(
            "workflow version '{}' is not in 'major.minor' form",
            def.version
        ));
    }

    if def.steps.is_empty() {
        errors.push("workflow must have at least one step".to_string());
    }

    for step in &def.steps {
        check_step_schema(step, errors);
    }
}

fn is_major_minor(version: &str) -> bool {
    let mut parts = version.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(major), Some(minor), None)
            if major.parse::<u64>().is_ok() && minor.parse::<u64>().is_ok()
    )
}

fn check_step_schema(step: &Step, errors: &mut Vec<String>) {
    if step.id.is_empty() {
        errors.push("step id must not be empty".to_string());
    }
    if let Some(timeout) = step.timeout_secs {
        if timeout == 0 {
            errors.push(format!("step '{}': timeout must be > 0", step.id));
        }
    }

    match &step.config {
        StepConfig::Command {
            command, extract, ..
        } => {
            if command.trim().is_empty() {
                errors.push(format!("step '{}': command must not be empty", step.id));
            }
            for rule in extract {
                if rule.json_path.is_none() && rule.regex.is_none() {
                    errors.push(format!(
                        "step '{}': extraction rule '{}' needs a json_path or a regex",
                        step.id, rule.name
                    ));
                }
            }
        }
        StepConfig::PluginAction { plugin, action, .. } => {
            if plugin.is_empty() || action.is_empty() {
                errors.push(format!(
                    "step '{}': plugin and action must not be empty",
                    step.id
                ));
            }
        }
        StepConfig::Template { template, .. } => {
            if template.is_empty() {
                errors.push(format!("step '{}': template name must not be empty", step.id));
            }
        }
        StepConfig::Conditional {
            condition,
            then_steps,
            else_steps,
        } => {
            if condition.trim().is_empty() {
                errors.push(format!("step '{}': condition must not be empty", step.id));
            }
            if then_steps.is_empty() && else_steps.is_empty() {
                errors.push(format!(
                    "step '{}': conditional has no then/else steps",
                    step.id
                ));
            }
            for nested in then_steps.iter().chain(else_steps.iter()) {
                check_step_schema(nested, errors);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Semantic check
// ---------------------------------------------------------------------------

fn check_semantics(def: &WorkflowDefinition, errors: &mut Vec<String>) {
    // Unique top-level step ids.
    let mut seen_ids = HashSet::new();
    for step in &def.steps {
        if !seen_ids.insert(step.id.as_str()) {
            errors.push(format!("duplicate step id: '{}'", step.id));
        }
        check_nested_ids(step, errors);
    }

    // `requires` entries must resolve.
    for step in &def.steps {
        for dep in &step.requires {
            if !seen_ids.contains(dep.as_str()) {
                errors.push(format!(
                    "step '{}' requires unknown step '{}'",
                    step.id, dep
                ));
            }
        }
    }

    // Unique input names; enum inputs must declare their values.
    let mut input_names = HashSet::new();
    for input in &def.inputs {
        if !input_names.insert(input.name.as_str()) {
            errors.push(format!("duplicate input name: '{}'", input.name));
        }
        if input.input_type == opsflow_types::workflow::InputType::Enum
            && input.values.as_ref().is_none_or(|v| v.is_empty())
        {
            errors.push(format!(
                "input '{}': enum inputs must declare their allowed values",
                input.name
            ));
        }
    }

    // Outputs must reference existing steps.
    for output in &def.outputs {
        if !seen_ids.contains(output.step.as_str()) {
            errors.push(format!(
                "output '{}' references unknown step '{}'",
                output.name, output.step
            ));
        }
    }

    // Cycle detection over the requires-graph, reporting the full path.
    if let Some(cycle) = find_cycle(&def.steps) {
        errors.push(format!(
            "cycle detected in requires-graph: {}",
            cycle.join(" -> ")
        ));
    }
}

/// Nested conditional branches get their own id scope; ids must be unique
/// within each branch list.
fn check_nested_ids(step: &Step, errors: &mut Vec<String>) {
    if let StepConfig::Conditional {
        then_steps,
        else_steps,
        ..
    } = &step.config
    {
        for branch in [then_steps, else_steps] {
            let mut seen = HashSet::new();
            for nested in branch {
                if !seen.insert(nested.id.as_str()) {
                    errors.push(format!(
                        "step '{}': duplicate nested step id '{}'",
                        step.id, nested.id
                    ));
                }
                check_nested_ids(nested, errors);
            }
        }
    }
}

/// DFS with an explicit recursion stack over the requires-graph.
///
/// Returns the offending path as `[a, b, c, a]` when a cycle exists. Unknown
/// `requires` targets are ignored here; they are reported separately.
fn find_cycle(steps: &[Step]) -> Option<Vec<String>> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    for step in steps {
        indices
            .entry(step.id.as_str())
            .or_insert_with(|| graph.add_node(step.id.as_str()));
    }
    for step in steps {
        let from = indices[step.id.as_str()];
        for dep in &step.requires {
            if let Some(&to) = indices.get(dep.as_str()) {
                // Edge follows the `requires` direction: step -> dependency.
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut on_stack: Vec<NodeIndex> = Vec::new();

    fn dfs(
        graph: &DiGraph<&str, ()>,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        if let Some(pos) = on_stack.iter().position(|&n| n == node) {
            let mut cycle: Vec<NodeIndex> = on_stack[pos..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if !visited.insert(node) {
            return None;
        }
        on_stack.push(node);
        for next in graph.neighbors(node) {
            if let Some(cycle) = dfs(graph, next, visited, on_stack) {
                return Some(cycle);
            }
        }
        on_stack.pop();
        None
    }

    // Visit in declaration order so the reported cycle is stable.
    for step in steps {
        let node = indices[step.id.as_str()];
        if let Some(cycle) = dfs(&graph, node, &mut visited, &mut on_stack) {
            return Some(cycle.into_iter().map(|n| graph[n].to_string()).collect());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Non-blocking warnings
// ---------------------------------------------------------------------------

fn collect_warnings(def: &WorkflowDefinition, warnings: &mut Vec<String>) {
    use opsflow_types::workflow::FailurePolicy;

    if !def.steps.is_empty()
        && def
            .steps
            .iter()
            .all(|s| s.on_failure == FailurePolicy::Abort)
    {
        warnings.push(
            "no step declares failure handling; any failure aborts the run".to_string(),
        );
    }

    if def.steps.len() > LARGE_WORKFLOW_STEPS {
        warnings.push(format!(
            "workflow has {} steps; consider splitting it",
            def.steps.len()
        ));
    }

    for step in &def.steps {
        if step.timeout_secs.is_none() {
            warnings.push(format!(
                "step '{}' has no timeout; the 300s default applies",
                step.id
            ));
        }
    }

    if def.outputs.is_empty() {
        warnings.push("workflow declares no outputs".to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use opsflow_types::workflow::{FailurePolicy, InputSpec, InputType, OutputSpec};
    use std::collections::HashMap;

    fn command_step(id: &str, requires: Vec<&str>) -> Step {
        Step {
            id: id.to_string(),
            description: None,
            on_failure: FailurePolicy::Abort,
            timeout_secs: Some(30),
            requires: requires.into_iter().map(String::from).collect(),
            config: StepConfig::Command {
                command: format!("echo {id}"),
                working_dir: None,
                env: HashMap::new(),
                extract: vec![],
                rollback_command: None,
            },
        }
    }

    fn workflow(steps: Vec<Step>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "test-wf".to_string(),
            version: "1.0".to_string(),
            description: None,
            inputs: vec![],
            steps,
            outputs: vec![OutputSpec {
                name: "out".to_string(),
                step: "a".to_string(),
                path: "stdout".to_string(),
            }],
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn valid_workflow_passes() {
        let def = workflow(vec![command_step("a", vec![]), command_step("b", vec!["a"])]);
        let report = Validator::default().validate(&def);
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn cycle_names_every_step_in_the_path() {
        let def = workflow(vec![
            command_step("a", vec!["c"]),
            command_step("b", vec!["a"]),
            command_step("c", vec!["b"]),
        ]);
        let report = Validator::default().validate(&def);
        assert!(!report.is_valid);
        let cycle_err = report
            .errors
            .iter()
            .find(|e| e.contains("cycle detected"))
            .expect("cycle error");
        for id in ["a", "b", "c"] {
            assert!(cycle_err.contains(id), "missing '{id}' in: {cycle_err}");
        }
    }

    #[test]
    fn duplicate_step_ids_rejected() {
        let def = workflow(vec![command_step("a", vec![]), command_step("a", vec![])]);
        let report = Validator::default().validate(&def);
        assert!(report.errors.iter().any(|e| e.contains("duplicate step id")));
    }

    #[test]
    fn unknown_requires_rejected() {
        let def = workflow(vec![command_step("a", vec!["ghost"])]);
        let report = Validator::default().validate(&def);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("requires unknown step 'ghost'")));
    }

    #[test]
    fn duplicate_input_names_rejected() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        for _ in 0..2 {
            def.inputs.push(InputSpec {
                name: "env".to_string(),
                input_type: InputType::String,
                required: true,
                default: None,
                values: None,
            });
        }
        let report = Validator::default().validate(&def);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("duplicate input name")));
    }

    #[test]
    fn enum_input_requires_values() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        def.inputs.push(InputSpec {
            name: "license".to_string(),
            input_type: InputType::Enum,
            required: false,
            default: None,
            values: None,
        });
        let report = Validator::default().validate(&def);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("must declare their allowed values")));
    }

    #[test]
    fn bad_version_rejected() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        def.version = "1.0.0".to_string();
        let report = Validator::default().validate(&def);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("'major.minor' form")));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        def.steps[0].timeout_secs = Some(0);
        let report = Validator::default().validate(&def);
        assert!(report.errors.iter().any(|e| e.contains("timeout must be > 0")));
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        def.steps[0].timeout_secs = None;
        def.outputs.clear();
        let report = Validator::default().validate(&def);
        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("no timeout")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("declares no outputs")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("failure handling")));
    }

    #[test]
    fn output_referencing_unknown_step_rejected() {
        let mut def = workflow(vec![command_step("a", vec![])]);
        def.outputs[0].step = "missing".to_string();
        let report = Validator::default().validate(&def);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("references unknown step 'missing'")));
    }
}
