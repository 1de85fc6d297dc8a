//! In-memory template catalog.

use std::collections::HashMap;

use opsflow_core::workflow::templates::TemplateLibrary;
use opsflow_types::workflow::Step;

/// Template catalog held in memory, loaded at startup.
///
/// Catalog entries are step lists parsed from the same YAML shape as
/// workflow `steps`.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, Vec<Step>>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: impl Into<String>, steps: Vec<Step>) {
        self.templates.insert(name.into(), steps);
    }

    /// Parse a YAML step list and add it under a name.
    pub fn insert_yaml(
        &mut self,
        name: impl Into<String>,
        yaml: &str,
    ) -> Result<(), serde_yaml_ng::Error> {
        let steps: Vec<Step> = serde_yaml_ng::from_str(yaml)?;
        self.templates.insert(name.into(), steps);
        Ok(())
    }
}

impl TemplateLibrary for TemplateCatalog {
    fn resolve(&self, name: &str) -> Option<Vec<Step>> {
        self.templates.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
