//! Deterministic execution ordering over the requires-graph.
//!
//! Depth-first topological sort with visited and in-progress sets. Steps are
//! visited in declaration order and each step's `requires` list is walked in
//! its declared order, so the tie-break among independent ready steps is
//! first-declared-first-scheduled. The same step list always produces the
//! same total order.

use std::collections::{HashMap, HashSet};

use opsflow_types::workflow::Step;

use super::definition::WorkflowError;

/// Compute the total execution order for a step list.
///
/// The validator should already have rejected cycles and unresolved
/// `requires` entries; hitting one here is defensive and returns an error
/// naming the offending step.
pub fn execution_order(steps: &[Step]) -> Result<Vec<String>, WorkflowError> {
    let by_id: HashMap<&str, &Step> = steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut order: Vec<String> = Vec::with_capacity(steps.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut in_progress: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Step>,
        visited: &mut HashSet<&'a str>,
        in_progress: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), WorkflowError> {
        if visited.contains(id) {
            return Ok(());
        }
        if !in_progress.insert(id) {
            return Err(WorkflowError::CycleDetected(format!(
                "cycle involving step '{id}'"
            )));
        }
        let step = by_id.get(id).ok_or_else(|| {
            WorkflowError::UnknownDependency(format!("step '{id}' is not defined"))
        })?;
        for dep in &step.requires {
            visit(dep.as_str(), by_id, visited, in_progress, order)?;
        }
        in_progress.remove(id);
        visited.insert(id);
        order.push(id.to_string());
        Ok(())
    }

    for step in steps {
        visit(
            step.id.as_str(),
            &by_id,
            &mut visited,
            &mut in_progress,
            &mut order,
        )?;
    }

    Ok(order)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
