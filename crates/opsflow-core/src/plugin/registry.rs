use std::collections::HashMap;
use std::sync::Arc;

use opsflow_types::error::PluginError;
use tracing::debug;

use super::Plugin;

/// Registry of plugins, keyed by name with a capability index.
///
/// Registration is explicit at startup; the registry is immutable once the
/// executor holds it, so lookups take `&self`.
#[derive(Default)]
pub struct PluginRegistry {
    by_name: HashMap<String, Arc<dyn Plugin>>,
    /// capability -> plugin names, in registration order.
    by_capability: HashMap<String, Vec<String>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A plugin re-registered under the same name
    /// replaces the previous one.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        debug!(plugin = %name, "registering plugin");
        for capability in plugin.capabilities() {
            let names = self.by_capability.entry(capability).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
        }
        self.by_name.insert(name, plugin);
    }

    /// Look up a plugin by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::PluginNotFound(name.to_string()))
    }

    /// Plugins advertising a capability, in registration order.
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<dyn Plugin>> {
        self.by_capability
            .get(capability)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.by_name.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
