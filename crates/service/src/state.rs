//! Shared application state threaded through every operation.

use std::sync::Arc;

use paceline_events::EventBus;
use paceline_store::{
    CatalogProvider, DocumentStore, MemoryCatalog, MemorySessions, MemoryStore, SessionStore,
};

use crate::config::ServiceConfig;

/// Collaborator handles plus configuration, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<ServiceConfig>,
    /// Document persistence collaborator.
    pub store: Arc<dyn DocumentStore>,
    /// Session resolution collaborator.
    pub sessions: Arc<dyn SessionStore>,
    /// Content catalog collaborator.
    pub catalog: Arc<dyn CatalogProvider>,
    /// Fire-and-forget event bus.
    pub events: Arc<EventBus>,
}

/// Concrete handles returned by [`AppState::in_memory`] so tests and
/// embedders can seed sessions and catalog content.
pub struct InMemoryHandles {
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<MemorySessions>,
    pub catalog: Arc<MemoryCatalog>,
}

impl AppState {
    /// Wire up production collaborators.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
        catalog: Arc<dyn CatalogProvider>,
    ) -> Self {
        let events = Arc::new(EventBus::new(config.event_bus_capacity));
        Self {
            config: Arc::new(config),
            store,
            sessions,
            catalog,
            events,
        }
    }

    /// State backed entirely by in-memory collaborators, with the
    /// concrete handles for seeding. Used by tests and embedders.
    pub fn in_memory() -> (Self, InMemoryHandles) {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessions::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let state = AppState::new(
            ServiceConfig::default(),
            store.clone(),
            sessions.clone(),
            catalog.clone(),
        );
        (
            state,
            InMemoryHandles {
                store,
                sessions,
                catalog,
            },
        )
    }
}
