/// All entity ids are UUIDv7, so creation order is roughly sortable.
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
