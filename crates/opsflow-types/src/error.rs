//! Error types shared across trait boundaries.

use thiserror::Error;

/// Errors from snapshot-store operations (used by trait definitions in
/// `opsflow-core`; implementations live in `opsflow-infra`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("entry not found")]
    NotFound,
}

/// Errors from plugin resolution and invocation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin not found: '{0}'")]
    PluginNotFound(String),

    #[error("plugin '{plugin}' has no action '{action}'")]
    ActionNotFound { plugin: String, action: String },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("plugin invocation failed: {0}")]
    InvocationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_error_display() {
        let err = PluginError::ActionNotFound {
            plugin: "git".to_string(),
            action: "push".to_string(),
        };
        assert_eq!(err.to_string(), "plugin 'git' has no action 'push'");
    }
}
