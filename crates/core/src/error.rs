use crate::types::EntityId;

/// Domain-level error taxonomy.
///
/// Validation-class variants signal caller bugs and must never be retried.
/// Conflict-class variants ([`CoreError::DuplicatePendingShare`],
/// [`CoreError::AlreadyResponded`], [`CoreError::Conflict`]) are expected
/// under concurrent access; callers should re-fetch and decide.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed duration '{input}': {reason}")]
    MalformedDuration { input: String, reason: String },

    #[error("Unknown curve shape '{0}'")]
    UnknownCurveShape(String),

    #[error("User {user_id} has no active enrollment in behavior {behavior_id}")]
    NotEnrolled {
        behavior_id: EntityId,
        user_id: EntityId,
    },

    #[error("A pending {kind} share of item {item_id} to user {recipient_id} already exists")]
    DuplicatePendingShare {
        kind: &'static str,
        item_id: EntityId,
        recipient_id: EntityId,
    },

    #[error("Share {share_id} has already been responded to")]
    AlreadyResponded { share_id: EntityId },

    #[error("Content catalog is empty")]
    EmptyCatalog,

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}
