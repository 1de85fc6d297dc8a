//! Pluggable safety policy for workflow definitions.
//!
//! The validator delegates its third check to a `SafetyChecker`. Violations
//! become validation errors; warnings pass through unchanged. Checkers are
//! injected explicitly -- there is no global policy registry.

use opsflow_types::workflow::{Step, StepConfig, WorkflowDefinition};

/// Outcome of a safety-policy check.
#[derive(Debug, Clone)]
pub struct SafetyReport {
    pub is_safe: bool,
    /// Policy violations; the validator turns these into errors.
    pub violations: Vec<String>,
    /// Advisory findings; passed through as validation warnings.
    pub warnings: Vec<String>,
}

impl SafetyReport {
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// A pluggable safety policy. Must be pure: no side effects, no I/O.
pub trait SafetyChecker: Send + Sync {
    fn check(&self, def: &WorkflowDefinition) -> SafetyReport;
}

// ---------------------------------------------------------------------------
// Command deny list
// ---------------------------------------------------------------------------

/// Default policy: scans command text (including nested conditional branches)
/// for patterns that destroy data or escalate privileges.
pub struct CommandDenyList {
    /// Substrings that block validation outright.
    denied: Vec<&'static str>,
    /// Substrings that only produce a warning.
    discouraged: Vec<&'static str>,
}

impl Default for CommandDenyList {
    fn default() -> Self {
        Self {
            denied: vec![
                "rm -rf /",
                "rm -rf ~",
                "mkfs",
                "dd if=",
                "> /dev/sd",
                ":(){ :|:& };:",
            ],
            discouraged: vec!["sudo ", "curl | sh", "curl|sh", "wget | sh"],
        }
    }
}

impl CommandDenyList {
    fn scan_step(&self, step: &Step, report: &mut SafetyReport) {
        match &step.config {
            StepConfig::Command { command, .. } => {
                for pattern in &self.denied {
                    if command.contains(pattern) {
                        report.is_safe = false;
                        report.violations.push(format!(
                            "step '{}': command contains blocked pattern '{}'",
                            step.id, pattern
                        ));
                    }
                }
                for pattern in &self.discouraged {
                    if command.contains(pattern) {
                        report.warnings.push(format!(
                            "step '{}': command contains discouraged pattern '{}'",
                            step.id,
                            pattern.trim()
                        ));
                    }
                }
            }
            StepConfig::Conditional {
                then_steps,
                else_steps,
                ..
            } => {
                for nested in then_steps.iter().chain(else_steps.iter()) {
                    self.scan_step(nested, report);
                }
            }
            _ => {}
        }
    }
}

impl SafetyChecker for CommandDenyList {
    fn check(&self, def: &WorkflowDefinition) -> SafetyReport {
        let mut report = SafetyReport::safe();
        for step in &def.steps {
            self.scan_step(step, &mut report);
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
