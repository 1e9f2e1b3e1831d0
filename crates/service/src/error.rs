use paceline_core::CoreError;
use paceline_store::StoreError;

/// Operation-level error type for the service surface.
///
/// Domain failures and collaborator failures stay distinct variants so
/// callers can apply different retry policy: validation errors are caller
/// bugs, conflict-class errors call for a re-fetch, and store
/// availability failures may be retried by the transport.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A domain-level error from `paceline_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A collaborator error from `paceline_store`.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for operation return values.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Conflict-class errors are expected under concurrent access; the
    /// caller should re-fetch and decide, never blind-retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Core(
                CoreError::Conflict(_)
                    | CoreError::AlreadyResponded { .. }
                    | CoreError::DuplicatePendingShare { .. }
            ) | ServiceError::Store(StoreError::VersionConflict { .. })
        )
    }

    /// Collaborator failures that a transport may retry with backoff.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn conflict_classification() {
        let conflict: ServiceError = CoreError::AlreadyResponded {
            share_id: Uuid::now_v7(),
        }
        .into();
        assert!(conflict.is_conflict());

        let cas: ServiceError = StoreError::VersionConflict {
            collection: "shares".to_string(),
            id: Uuid::now_v7(),
        }
        .into();
        assert!(cas.is_conflict());

        let validation: ServiceError = CoreError::Validation("bad".to_string()).into();
        assert!(!validation.is_conflict());
    }

    #[test]
    fn collaborator_failure_classification() {
        let unavailable: ServiceError =
            StoreError::Unavailable("connection refused".to_string()).into();
        assert!(unavailable.is_collaborator_failure());
        assert!(!unavailable.is_conflict());

        let validation: ServiceError = CoreError::EmptyCatalog.into();
        assert!(!validation.is_collaborator_failure());
    }
}
