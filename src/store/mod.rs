//! The relational store seam.
//!
//! The engine itself is an external collaborator: anything that can run
//! parameterized SELECT/INSERT/UPDATE/DELETE, scope mutations in a
//! transaction, and report generated keys can sit behind these traits.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One result row: column alias -> value, in projection order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Unknown column or violated constraint; surfaced distinctly so callers
    /// can tell a schema mismatch from an operational failure.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
    #[error("Statement execution failed: {0}")]
    Execution(String),
    #[error("Transaction failed: {0}")]
    Transaction(String),
}

/// A single open transaction. Exactly one of `commit`/`rollback` must be
/// called on every path before the transaction is dropped.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Execute a single-row INSERT; returns the generated row key. SQLite
    /// convention: valid keys are strictly positive, -1 is the failure
    /// sentinel.
    async fn insert(&mut self, sql: &str, params: Vec<Value>) -> Result<i64, StoreError>;

    /// Execute an UPDATE or DELETE; returns the affected-row count.
    async fn exec(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// The store itself. Reads run outside any explicit transaction but must
/// observe a single point-in-time snapshot for the duration of the query.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
