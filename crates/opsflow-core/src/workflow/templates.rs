//! Template library port.
//!
//! Template steps expand into a named sequence of sub-steps at run time.
//! The library is a lookup seam: core resolves names through the trait and
//! the infra crate supplies the concrete catalog.

use opsflow_types::workflow::Step;

/// Resolves template names to the step sequences they expand into.
pub trait TemplateLibrary: Send + Sync {
    /// Look up a template by name. `None` means the template is unknown,
    /// which fails the referencing step at run time.
    fn resolve(&self, name: &str) -> Option<Vec<Step>>;

    /// Names of every template in the library, for diagnostics.
    fn names(&self) -> Vec<String>;
}

/// An empty library. Every template reference fails.
#[derive(Debug, Default)]
pub struct NoTemplates;

impl TemplateLibrary for NoTemplates {
    fn resolve(&self, _name: &str) -> Option<Vec<Step>> {
        None
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}
