//! Document store contract.
//!
//! A narrow, single-item-atomic key/value interface: every aggregate is
//! one JSON document, versioned for optimistic concurrency. No cross-key
//! transactions are assumed — cross-aggregate effects are built as sagas
//! in the service layer.

use async_trait::async_trait;
use paceline_core::types::EntityId;
use serde_json::Value;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A stored document plus its monotonically increasing version.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub value: Value,
    pub version: u64,
}

/// Concurrency intent of a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// Unconditional write (last-writer-wins).
    Any,
    /// Insert: the key must not exist yet.
    Absent,
    /// Compare-and-set: the stored version must match.
    Version(u64),
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A conjunction of top-level field equality clauses.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Add an equality clause on a top-level field.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Whether a document value satisfies every clause.
    pub fn matches(&self, value: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| value.get(field) == Some(expected))
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// The persistence collaborator. Implementations must make each `put`
/// atomic with respect to its own key; nothing more is assumed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: EntityId) -> Result<Option<Document>, StoreError>;

    /// Write a document, returning the new version. Fails with
    /// [`StoreError::VersionConflict`] when `expected` is not met.
    async fn put(
        &self,
        collection: &str,
        id: EntityId,
        value: Value,
        expected: Expected,
    ) -> Result<u64, StoreError>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: EntityId) -> Result<bool, StoreError>;

    /// All documents in a collection matching the filter, ordered by id.
    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(EntityId, Document)>, StoreError>;
}
