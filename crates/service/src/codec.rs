//! Document encode/decode helpers shared by the operation modules.

use paceline_core::types::EntityId;
use paceline_core::CoreError;
use paceline_store::{Document, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;

/// Serialize an aggregate for storage.
pub(crate) fn encode<T: Serialize>(value: &T) -> ServiceResult<Value> {
    serde_json::to_value(value).map_err(|err| ServiceError::Store(StoreError::Serialization(err)))
}

/// Deserialize a stored document into an aggregate.
pub(crate) fn decode<T: DeserializeOwned>(doc: &Document) -> ServiceResult<T> {
    serde_json::from_value(doc.value.clone())
        .map_err(|err| ServiceError::Store(StoreError::Serialization(err)))
}

/// Fetch and decode an aggregate, returning its version for later
/// compare-and-set writes.
pub(crate) async fn load<T: DeserializeOwned>(
    state: &AppState,
    collection: &str,
    id: EntityId,
    entity: &'static str,
) -> ServiceResult<(T, u64)> {
    let doc = state
        .store
        .get(collection, id)
        .await?
        .ok_or(ServiceError::Core(CoreError::NotFound { entity, id }))?;
    Ok((decode(&doc)?, doc.version))
}

/// Organization scoping check. A foreign org's aggregate reads as absent
/// rather than forbidden, so ids cannot be probed across tenants.
pub(crate) fn ensure_org(
    entity: &'static str,
    id: EntityId,
    entity_org: EntityId,
    ctx: &RequestContext,
) -> ServiceResult<()> {
    if entity_org == ctx.org_id {
        Ok(())
    } else {
        Err(ServiceError::Core(CoreError::NotFound { entity, id }))
    }
}
