//! Workflow orchestration engine for Opsflow.
//!
//! This crate defines the "ports" (plugin registry, template library, safety
//! checker, snapshot store) and the engine that drives them: validator,
//! deterministic execution ordering, step runner, rollback manager, and the
//! workflow executor. It depends only on `opsflow-types` -- never on
//! `opsflow-infra` or any storage/transport crate.

pub mod plugin;
pub mod safety;
pub mod storage;
pub mod workflow;
