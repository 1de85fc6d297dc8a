//! Built-in plugins.
//!
//! `FsPlugin` covers basic filesystem actions so workflows can manipulate
//! files without shelling out; `GitPlugin` wraps the staging and commit
//! subcommands. Additional plugins register through the same
//! `PluginRegistry` at startup.

mod fs;
mod git;

pub use fs::FsPlugin;
pub use git::GitPlugin;

use std::sync::Arc;

use opsflow_core::plugin::PluginRegistry;

/// A registry pre-loaded with every built-in plugin.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(FsPlugin));
    registry.register(Arc::new(GitPlugin));
    registry
}
