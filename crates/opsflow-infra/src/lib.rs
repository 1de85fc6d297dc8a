//! Concrete adapters for the Opsflow engine ports: an in-memory snapshot
//! store, built-in plugins, and a template catalog.

pub mod memory;
pub mod plugins;
pub mod templates;
