//! Content catalog contract.
//!
//! The catalog service owns content authoring; this boundary only hands
//! the allocator an ordered list of (content, category) rows per
//! organization. Providers must keep the ordering stable — allocation
//! determinism depends on it.

use std::collections::HashMap;

use async_trait::async_trait;
use paceline_core::allocation::CatalogEntry;
use paceline_core::types::EntityId;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// The content catalog collaborator.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// The organization's catalog, grouped by category in the provider's
    /// stable order.
    async fn by_category(&self, org_id: EntityId) -> Result<Vec<CatalogEntry>, StoreError>;
}

/// In-memory catalog for tests and embedders.
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<HashMap<EntityId, Vec<CatalogEntry>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        MemoryCatalog::default()
    }

    /// Replace an organization's catalog.
    pub async fn set(&self, org_id: EntityId, entries: Vec<CatalogEntry>) {
        self.entries.write().await.insert(org_id, entries);
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalog {
    async fn by_category(&self, org_id: EntityId) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&org_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
