//! Storage port for definitions and execution snapshots.
//!
//! The executor persists best-effort snapshots through this trait; infra
//! supplies the backend. Native async methods keep the trait zero-cost for
//! generic callers, which is why the executor is generic over the store
//! rather than holding a trait object.

use opsflow_types::error::StoreError;
use serde_json::Value;

/// Default TTL for stored workflow definitions: 30 days.
pub const DEFINITION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default TTL for execution snapshots: 7 days.
pub const EXECUTION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Key prefix for workflow definitions.
pub const WORKFLOW_PREFIX: &str = "workflow:";

/// Key prefix for execution records.
pub const EXECUTION_PREFIX: &str = "execution:";

/// Async key-value store with per-key TTL.
pub trait SnapshotStore: Send + Sync {
    /// Store a value under a key. `ttl_secs = None` means no expiry.
    fn put(
        &self,
        key: &str,
        value: Value,
        ttl_secs: Option<u64>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a value. `Ok(None)` means absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List live keys under a prefix.
    fn scan(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// A store that persists nothing. Snapshots are best-effort, so running
/// without a backend is a supported configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl SnapshotStore for NullStore {
    async fn put(&self, _key: &str, _value: Value, _ttl_secs: Option<u64>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn scan(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

/// Key for a stored workflow definition.
pub fn workflow_key(name: &str) -> String {
    format!("{WORKFLOW_PREFIX}{name}")
}

/// Key for a stored execution record.
pub fn execution_key(execution_id: &uuid::Uuid) -> String {
    format!("{EXECUTION_PREFIX}{execution_id}")
}
