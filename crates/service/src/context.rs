//! Explicit request context.
//!
//! Every operation takes the caller's identity as a value resolved once
//! at the transport boundary — there is no ambient "current session"
//! state anywhere in the service.

use paceline_core::types::EntityId;
use paceline_store::SessionContext;

use crate::error::ServiceResult;
use crate::state::AppState;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: EntityId,
    pub org_id: EntityId,
}

impl From<SessionContext> for RequestContext {
    fn from(session: SessionContext) -> Self {
        RequestContext {
            user_id: session.user_id,
            org_id: session.org_id,
        }
    }
}

/// Exchange an opaque session token for a request context.
///
/// Unknown or expired tokens fail with
/// [`paceline_store::StoreError::InvalidSession`].
pub async fn authenticate(state: &AppState, token: &str) -> ServiceResult<RequestContext> {
    let session = state.sessions.resolve(token).await?;
    Ok(session.into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use assert_matches::assert_matches;
    use paceline_store::StoreError;
    use uuid::Uuid;

    #[tokio::test]
    async fn authenticate_resolves_known_token() {
        let (state, handles) = AppState::in_memory();
        let session = SessionContext {
            user_id: Uuid::now_v7(),
            org_id: Uuid::now_v7(),
        };
        handles.sessions.insert("token-1", session).await;

        let ctx = authenticate(&state, "token-1").await.unwrap();
        assert_eq!(ctx.user_id, session.user_id);
        assert_eq!(ctx.org_id, session.org_id);
    }

    #[tokio::test]
    async fn authenticate_rejects_unknown_token() {
        let (state, _handles) = AppState::in_memory();
        let err = authenticate(&state, "missing").await.unwrap_err();
        assert_matches!(err, ServiceError::Store(StoreError::InvalidSession));
    }
}
