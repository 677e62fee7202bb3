//! Hosted table store contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::query::Query;

/// Table-level reads and writes against the remote store.
///
/// Rows travel as JSON objects; typed models live in `fms-db`.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Rows matching `query`, ordered and limited as requested.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError>;

    /// Number of rows matching `query`'s filters.
    async fn count(&self, query: &Query) -> Result<u64, RemoteError>;

    /// Insert one row and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Apply `patch` to every row matching `query` and return the updated rows.
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError>;

    async fn delete(&self, query: &Query) -> Result<(), RemoteError>;
}
