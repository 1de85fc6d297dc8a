//! Compensation types: recorded rollback actions and the rollback report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of compensating action recorded for an irreversible effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackActionKind {
    /// Run a paired rollback command as a subprocess.
    Command,
    /// Restore a file from its backup, or delete it if newly created.
    FileRestore,
    /// Remove a directory the workflow itself created.
    DirectoryRestore,
    /// Invoke a declared compensating plugin action.
    PluginAction,
}

/// One recorded compensating action.
///
/// Appended immediately after a step performs an irreversible effect and
/// consumed in reverse chronological order during rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAction {
    /// The step that performed the effect being compensated.
    pub step_id: String,
    pub kind: RollbackActionKind,
    /// Human-readable description for logs and reports.
    pub description: String,
    /// Kind-specific payload:
    /// - command: `{ "command": "..." }`
    /// - file_restore: `{ "path": "...", "backup_path": "..."? }`
    /// - directory_restore: `{ "path": "...", "created": bool }`
    /// - plugin_action: `{ "plugin": "...", "action": "...", "params": {..} }`
    pub data: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Result of a rollback pass over an execution's recorded actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackReport {
    /// True when every compensation succeeded.
    pub success: bool,
    /// Number of compensations that succeeded.
    pub actions_rolled_back: usize,
    /// Errors from failed compensations. A failed compensation never blocks
    /// the remaining ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_snake_case() {
        let json_str = serde_json::to_string(&RollbackActionKind::FileRestore).unwrap();
        assert_eq!(json_str, "\"file_restore\"");
    }

    #[test]
    fn action_round_trips() {
        let action = RollbackAction {
            step_id: "make-dir".to_string(),
            kind: RollbackActionKind::Command,
            description: "undo mkdir out".to_string(),
            data: json!({ "command": "rmdir out" }),
            recorded_at: Utc::now(),
        };
        let s = serde_json::to_string(&action).unwrap();
        let parsed: RollbackAction = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed.step_id, "make-dir");
        assert_eq!(parsed.data["command"], json!("rmdir out"));
    }
}
