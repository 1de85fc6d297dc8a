//! Filesystem plugin.

use futures_util::future::BoxFuture;
use opsflow_core::plugin::Plugin;
use opsflow_types::error::PluginError;
use serde_json::{Value, json};
use tracing::debug;

/// Built-in `fs` plugin with file and directory actions.
///
/// Actions:
/// - `write_file` { path, content } -- create or overwrite a file
/// - `read_file` { path } -- return file contents as a string
/// - `make_dir` { path } -- create a directory and its parents
/// - `remove` { path } -- delete a file or directory tree
pub struct FsPlugin;

impl FsPlugin {
    async fn dispatch(&self, action: &str, params: &Value) -> Result<Value, PluginError> {
        match action {
            "write_file" => {
                let path = require_str(params, "path")?;
                let content = require_str(params, "content")?;
                debug!(path, "fs.write_file");
                tokio::fs::write(path, content)
                    .await
                    .map_err(|e| invocation(path, e))?;
                Ok(json!({ "path": path, "bytes": content.len() }))
            }
            "read_file" => {
                let path = require_str(params, "path")?;
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| invocation(path, e))?;
                Ok(json!({ "path": path, "content": content }))
            }
            "make_dir" => {
                let path = require_str(params, "path")?;
                debug!(path, "fs.make_dir");
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| invocation(path, e))?;
                Ok(json!({ "path": path }))
            }
            "remove" => {
                let path = require_str(params, "path")?;
                debug!(path, "fs.remove");
                let metadata = tokio::fs::metadata(path).await;
                match metadata {
                    Ok(m) if m.is_dir() => tokio::fs::remove_dir_all(path)
                        .await
                        .map_err(|e| invocation(path, e))?,
                    Ok(_) => tokio::fs::remove_file(path)
                        .await
                        .map_err(|e| invocation(path, e))?,
                    // Removing something already gone is a no-op.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(invocation(path, e)),
                }
                Ok(json!({ "path": path }))
            }
            other => Err(PluginError::ActionNotFound {
                plugin: "fs".to_string(),
                action: other.to_string(),
            }),
        }
    }
}

impl Plugin for FsPlugin {
    fn name(&self) -> &str {
        "fs"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem".to_string()]
    }

    fn invoke<'a>(
        &'a self,
        action: &'a str,
        params: &'a Value,
    ) -> BoxFuture<'a, Result<Value, PluginError>> {
        Box::pin(self.dispatch(action, params))
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, PluginError> {
    params[field]
        .as_str()
        .ok_or_else(|| PluginError::InvalidParams(format!("missing string param '{field}'")))
}

fn invocation(path: &str, e: std::io::Error) -> PluginError {
    PluginError::InvocationFailed(format!("'{path}': {e}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
