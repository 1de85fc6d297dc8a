//! Shared application state for CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use opsflow_core::plugin::PluginRegistry;
use opsflow_core::workflow::executor::WorkflowExecutor;
use opsflow_core::workflow::rollback::RollbackManager;
use opsflow_core::workflow::step_runner::StepRunner;
use opsflow_core::workflow::validator::Validator;
use opsflow_infra::memory::MemoryStore;
use opsflow_infra::plugins::builtin_registry;
use opsflow_infra::templates::TemplateCatalog;

/// Engine wiring shared by every command handler.
pub struct AppState {
    pub executor: WorkflowExecutor<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub validator: Validator,
    /// Directory scanned for workflow files by `run` and `list-workflows`.
    pub workflows_dir: PathBuf,
}

impl AppState {
    pub fn init(workflows_dir: PathBuf) -> Self {
        let plugins: Arc<PluginRegistry> = Arc::new(builtin_registry());
        let templates = Arc::new(TemplateCatalog::new());
        let rollbacks = Arc::new(RollbackManager::new(plugins.clone()));
        let runner = Arc::new(StepRunner::new(plugins, templates, rollbacks.clone()));
        let store = Arc::new(MemoryStore::new());
        let executor = WorkflowExecutor::new(runner, rollbacks, store.clone());

        Self {
            executor,
            store,
            validator: Validator::default(),
            workflows_dir,
        }
    }
}
