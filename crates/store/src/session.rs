//! Session resolution contract.
//!
//! Credential validation itself lives in an external session service;
//! this boundary only exchanges an opaque token for the caller's user and
//! organization ids.

use std::collections::HashMap;

use async_trait::async_trait;
use paceline_core::types::EntityId;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// The identity a session token resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: EntityId,
    pub org_id: EntityId,
}

/// The session collaborator.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Exchange a token for its session, failing with
    /// [`StoreError::InvalidSession`] for unknown or expired tokens.
    async fn resolve(&self, token: &str) -> Result<SessionContext, StoreError>;
}

/// In-memory session table for tests and embedders.
#[derive(Default)]
pub struct MemorySessions {
    tokens: RwLock<HashMap<String, SessionContext>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        MemorySessions::default()
    }

    /// Register a token for later resolution.
    pub async fn insert(&self, token: impl Into<String>, session: SessionContext) {
        self.tokens.write().await.insert(token.into(), session);
    }

    /// Drop a token, simulating expiry.
    pub async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn resolve(&self, token: &str) -> Result<SessionContext, StoreError> {
        self.tokens
            .read()
            .await
            .get(token)
            .copied()
            .ok_or(StoreError::InvalidSession)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn resolve_known_token() {
        let sessions = MemorySessions::new();
        let session = SessionContext {
            user_id: Uuid::now_v7(),
            org_id: Uuid::now_v7(),
        };
        sessions.insert("token-1", session).await;

        let resolved = sessions.resolve("token-1").await.unwrap();
        assert_eq!(resolved, session);
    }

    #[tokio::test]
    async fn resolve_unknown_token_fails() {
        let sessions = MemorySessions::new();
        let err = sessions.resolve("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidSession));
    }

    #[tokio::test]
    async fn revoked_token_fails() {
        let sessions = MemorySessions::new();
        let session = SessionContext {
            user_id: Uuid::now_v7(),
            org_id: Uuid::now_v7(),
        };
        sessions.insert("token-1", session).await;
        sessions.revoke("token-1").await;
        assert!(matches!(
            sessions.resolve("token-1").await,
            Err(StoreError::InvalidSession)
        ));
    }
}
