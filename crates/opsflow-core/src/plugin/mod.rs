//! Plugin port and registry.
//!
//! Plugins extend workflows with named actions invoked by `plugin_action`
//! steps. The trait stays dyn-compatible by returning boxed futures instead
//! of using native async methods.

mod registry;

pub use registry::PluginRegistry;

use futures_util::future::BoxFuture;
use opsflow_types::error::PluginError;
use serde_json::Value;

/// A named provider of actions.
pub trait Plugin: Send + Sync {
    /// Unique plugin name, the `plugin:` field of a step.
    fn name(&self) -> &str;

    /// Capability tags used for discovery, e.g. `"filesystem"`.
    fn capabilities(&self) -> Vec<String>;

    /// Invoke one action with already-interpolated params.
    ///
    /// Unknown actions return `PluginError::ActionNotFound`; action
    /// failures return `PluginError::InvocationFailed`.
    fn invoke<'a>(
        &'a self,
        action: &'a str,
        params: &'a Value,
    ) -> BoxFuture<'a, Result<Value, PluginError>>;
}
