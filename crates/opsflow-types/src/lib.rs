//! Shared domain types for Opsflow.
//!
//! This crate contains the core domain types used across the Opsflow
//! workflow engine: workflow definitions, execution records, rollback
//! actions, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! and indexmap.

pub mod error;
pub mod execution;
pub mod rollback;
pub mod workflow;
