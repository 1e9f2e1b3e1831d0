use paceline_core::types::EntityId;

/// Failures at the collaborator boundary.
///
/// Kept distinct from [`paceline_core::CoreError`] so callers can apply a
/// different retry policy: a [`StoreError::VersionConflict`] is expected
/// under race and calls for a re-fetch, while
/// [`StoreError::Unavailable`] is a transient infrastructure fault.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid or expired session token")]
    InvalidSession,

    #[error("Version conflict on {collection}/{id}")]
    VersionConflict { collection: String, id: EntityId },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
