//! Share operations: invite, respond, and the join side effect.
//!
//! The terminal transition of a share is a single version-checked
//! compare-and-set, so two concurrent responses cannot both win. A join's
//! cross-aggregate effect (enrollment or user-plan creation) runs after
//! that CAS; when it fails, a compensating CAS reverts the share to
//! pending, keeping the pair all-or-nothing as observed by readers.

use chrono::Utc;
use paceline_core::behavior::{Behavior, BehaviorStatus};
use paceline_core::curve::CurveShape;
use paceline_core::plan::Plan;
use paceline_core::sharing::{self, PendingShare, ShareDecision, ShareKind, ShareState};
use paceline_core::types::EntityId;
use paceline_core::CoreError;
use paceline_events::{event_types, PlatformEvent};
use paceline_store::{Expected, Filter};
use serde::Deserialize;

use crate::codec::{decode, encode, ensure_org, load};
use crate::collections;
use crate::context::RequestContext;
use crate::error::ServiceResult;
use crate::plans;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ShareRequest {
    pub kind: String,
    pub item_id: EntityId,
    pub recipient_id: EntityId,
}

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

pub async fn share(
    state: &AppState,
    ctx: &RequestContext,
    input: ShareRequest,
) -> ServiceResult<PendingShare> {
    let kind = ShareKind::parse(&input.kind)?;
    let now = Utc::now();
    verify_item(state, ctx, kind, input.item_id).await?;

    let existing_docs = state
        .store
        .list(
            collections::SHARES,
            &Filter::new()
                .eq("kind", kind.as_str())
                .eq("item_id", input.item_id.to_string())
                .eq("recipient_id", input.recipient_id.to_string()),
        )
        .await?;
    let existing: Vec<PendingShare> = existing_docs
        .iter()
        .map(|(_, doc)| decode(doc))
        .collect::<ServiceResult<_>>()?;
    sharing::ensure_no_pending(&existing, kind, input.item_id, input.recipient_id)?;

    let share = PendingShare::new(
        ctx.org_id,
        kind,
        input.item_id,
        ctx.user_id,
        input.recipient_id,
        now,
    );
    state
        .store
        .put(
            collections::SHARES,
            share.id,
            encode(&share)?,
            Expected::Absent,
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::SHARE_CREATED)
            .with_org(ctx.org_id)
            .with_subject("share", share.id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(
        share_id = %share.id,
        kind = kind.as_str(),
        recipient_id = %input.recipient_id,
        "Share created"
    );
    Ok(share)
}

/// Check that the referenced item exists in the caller's organization and
/// matches the declared kind. Content and survey items live in external
/// services and are taken on trust.
async fn verify_item(
    state: &AppState,
    ctx: &RequestContext,
    kind: ShareKind,
    item_id: EntityId,
) -> ServiceResult<()> {
    if kind.is_behavior() {
        let (behavior, _): (Behavior, u64) =
            load(state, collections::BEHAVIORS, item_id, "Behavior").await?;
        ensure_org("Behavior", item_id, behavior.org_id, ctx)?;
        if ShareKind::from(behavior.kind) != kind {
            return Err(CoreError::Validation(format!(
                "Share kind '{}' does not match behavior kind '{}'",
                kind.as_str(),
                behavior.kind.as_str()
            ))
            .into());
        }
        if behavior.status != BehaviorStatus::Published {
            return Err(CoreError::Validation(
                "Only published behaviors can be shared".to_string(),
            )
            .into());
        }
    } else if kind == ShareKind::Plan {
        let (plan, _): (Plan, u64) = load(state, collections::PLANS, item_id, "Plan").await?;
        ensure_org("Plan", item_id, plan.org_id, ctx)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Respond
// ---------------------------------------------------------------------------

pub async fn respond(
    state: &AppState,
    ctx: &RequestContext,
    share_id: EntityId,
    decision: ShareDecision,
) -> ServiceResult<PendingShare> {
    let now = Utc::now();
    let (share, version): (PendingShare, u64) =
        load(state, collections::SHARES, share_id, "Share").await?;
    ensure_org("Share", share_id, share.org_id, ctx)?;
    if share.recipient_id != ctx.user_id {
        return Err(CoreError::Forbidden(
            "Only the recipient can respond to a share".to_string(),
        )
        .into());
    }

    let responded = share.respond(decision, now)?;
    // The terminal transition: exactly one racing responder passes this CAS.
    let responded_version = state
        .store
        .put(
            collections::SHARES,
            share_id,
            encode(&responded)?,
            Expected::Version(version),
        )
        .await?;

    match decision {
        ShareDecision::Join => {
            if let Err(err) = apply_join(state, ctx, &responded).await {
                compensate(state, share_id, &share, responded_version, &err).await;
                return Err(err);
            }
            state.events.publish(
                PlatformEvent::new(event_types::SHARE_JOINED)
                    .with_org(ctx.org_id)
                    .with_subject("share", share_id)
                    .with_actor(ctx.user_id),
            );
        }
        ShareDecision::Decline => {
            state.events.publish(
                PlatformEvent::new(event_types::SHARE_DECLINED)
                    .with_org(ctx.org_id)
                    .with_subject("share", share_id)
                    .with_actor(ctx.user_id),
            );
        }
    }
    tracing::info!(
        share_id = %share_id,
        state = responded.state.as_str(),
        "Share responded"
    );
    Ok(responded)
}

/// Materialize the enrollment or user plan a join promises.
async fn apply_join(
    state: &AppState,
    ctx: &RequestContext,
    share: &PendingShare,
) -> ServiceResult<()> {
    let now = Utc::now();
    if share.kind.is_behavior() {
        let (mut behavior, version): (Behavior, u64) =
            load(state, collections::BEHAVIORS, share.item_id, "Behavior").await?;
        if behavior.active_enrollment(ctx.user_id).is_some() {
            // Already enrolled; the join is satisfied as-is.
            return Ok(());
        }
        behavior.enroll(ctx.user_id, None, CurveShape::Linear, now)?;
        state
            .store
            .put(
                collections::BEHAVIORS,
                share.item_id,
                encode(&behavior)?,
                Expected::Version(version),
            )
            .await?;
        Ok(())
    } else if share.kind == ShareKind::Plan {
        plans::join_plan(state, ctx, share.item_id).await?;
        Ok(())
    } else {
        // Content and survey shares have no enrollment side effect; the
        // recommendation read side is consumed from external services.
        Ok(())
    }
}

/// Revert the share CAS after a failed join.
async fn compensate(
    state: &AppState,
    share_id: EntityId,
    original: &PendingShare,
    responded_version: u64,
    cause: &crate::error::ServiceError,
) {
    let value = match encode(original) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(
                share_id = %share_id,
                error = %err,
                "Failed to encode share for compensation"
            );
            return;
        }
    };
    let restored = state
        .store
        .put(
            collections::SHARES,
            share_id,
            value,
            Expected::Version(responded_version),
        )
        .await;
    match restored {
        Ok(_) => tracing::warn!(
            share_id = %share_id,
            error = %cause,
            "Join failed; share reverted to pending"
        ),
        Err(err) => tracing::error!(
            share_id = %share_id,
            error = %cause,
            compensation_error = %err,
            "Join failed and compensation failed; share left terminal"
        ),
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

pub async fn list_pending(
    state: &AppState,
    ctx: &RequestContext,
) -> ServiceResult<Vec<PendingShare>> {
    let docs = state
        .store
        .list(
            collections::SHARES,
            &Filter::new()
                .eq("recipient_id", ctx.user_id.to_string())
                .eq("state", ShareState::Pending.as_str()),
        )
        .await?;
    let mut shares: Vec<PendingShare> = docs
        .iter()
        .map(|(_, doc)| decode(doc))
        .collect::<ServiceResult<_>>()?;
    sharing::sort_by_creation(&mut shares);
    Ok(shares)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
