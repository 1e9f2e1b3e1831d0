//! In-memory reference implementation of the document store.
//!
//! Backs the test suites and in-process embedders. Per-collection maps
//! behind a single `RwLock` give the same single-item atomicity the
//! contract demands of production stores.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use paceline_core::types::EntityId;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::document::{Document, DocumentStore, Expected, Filter};
use crate::error::StoreError;

type Shard = BTreeMap<EntityId, Document>;

/// Process-local document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Shard>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: EntityId) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|shard| shard.get(&id))
            .cloned())
    }

    async fn put(
        &self,
        collection: &str,
        id: EntityId,
        value: Value,
        expected: Expected,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let shard = collections.entry(collection.to_string()).or_default();
        let current = shard.get(&id).map(|doc| doc.version);
        let conflict = || StoreError::VersionConflict {
            collection: collection.to_string(),
            id,
        };
        match (expected, current) {
            (Expected::Any, _) => {}
            (Expected::Absent, None) => {}
            (Expected::Absent, Some(_)) => return Err(conflict()),
            (Expected::Version(v), Some(stored)) if v == stored => {}
            (Expected::Version(_), _) => return Err(conflict()),
        }
        let version = current.unwrap_or(0) + 1;
        shard.insert(id, Document { value, version });
        Ok(version)
    }

    async fn delete(&self, collection: &str, id: EntityId) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|shard| shard.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(EntityId, Document)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|shard| {
                shard
                    .iter()
                    .filter(|(_, doc)| filter.matches(&doc.value))
                    .map(|(id, doc)| (*id, doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn put_then_get_round_trip() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        let version = store
            .put("widgets", id, json!({"n": 1}), Expected::Absent)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let doc = store.get("widgets", id).await.unwrap().unwrap();
        assert_eq!(doc.value, json!({"n": 1}));
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get("widgets", Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn absent_on_existing_key_conflicts() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store
            .put("widgets", id, json!({}), Expected::Absent)
            .await
            .unwrap();
        let err = store
            .put("widgets", id, json!({}), Expected::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn version_cas_succeeds_then_stale_writer_fails() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store
            .put("widgets", id, json!({"n": 1}), Expected::Absent)
            .await
            .unwrap();

        let version = store
            .put("widgets", id, json!({"n": 2}), Expected::Version(1))
            .await
            .unwrap();
        assert_eq!(version, 2);

        // A writer still holding version 1 loses.
        let err = store
            .put("widgets", id, json!({"n": 3}), Expected::Version(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn version_cas_on_missing_key_conflicts() {
        let store = MemoryStore::new();
        let err = store
            .put("widgets", Uuid::now_v7(), json!({}), Expected::Version(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn any_overwrites_unconditionally() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store
            .put("widgets", id, json!({"n": 1}), Expected::Absent)
            .await
            .unwrap();
        let version = store
            .put("widgets", id, json!({"n": 9}), Expected::Any)
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store
            .put("widgets", id, json!({}), Expected::Absent)
            .await
            .unwrap();
        assert!(store.delete("widgets", id).await.unwrap());
        assert!(!store.delete("widgets", id).await.unwrap());
        assert!(store.get("widgets", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_and_orders_by_id() {
        let store = MemoryStore::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let third = Uuid::now_v7();
        for (id, state) in [(first, "pending"), (second, "joined"), (third, "pending")] {
            store
                .put("shares", id, json!({"state": state}), Expected::Absent)
                .await
                .unwrap();
        }

        let pending = store
            .list("shares", &Filter::new().eq("state", "pending"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        // UUIDv7 ids sort by creation, so listing order is stable.
        assert_eq!(pending[0].0, first);
        assert_eq!(pending[1].0, third);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store
            .put("widgets", id, json!({}), Expected::Absent)
            .await
            .unwrap();
        assert!(store.get("gadgets", id).await.unwrap().is_none());
    }
}
