//! Workflow engine core: definition parsing, validation, ordering, and
//! execution.
//!
//! - `definition` -- YAML/JSON parsing, filesystem load/save/discover
//! - `validator` -- schema, semantic, and safety-policy checks
//! - `order` -- deterministic topological execution ordering
//! - `context` -- per-run execution context and snapshots
//! - `interpolate` -- `${...}` substitution over inputs/variables/outputs
//! - `condition` -- comparison evaluator for conditional steps
//! - `templates` -- named reusable step sequences
//! - `step_runner` -- timeout-bounded dispatch for the four step kinds
//! - `rollback` -- run-keyed compensation log and reverse-order rollback
//! - `executor` -- sequential dependency-ordered run driver

pub mod condition;
pub mod context;
pub mod definition;
pub mod executor;
pub mod interpolate;
pub mod order;
pub mod rollback;
pub mod step_runner;
pub mod templates;
pub mod validator;
