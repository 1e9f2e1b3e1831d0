//! Behavior operations: authoring, lifecycle, enrollment, and progress.

use chrono::Utc;
use paceline_core::behavior::{
    tracking_methods, Behavior, BehaviorKind, BehaviorStatus, Category, TrackerRule,
};
use paceline_core::curve::{self, CurveShape};
use paceline_core::tracker::{ProgressStatus, TargetedUser};
use paceline_core::types::{EntityId, Timestamp};
use paceline_core::CoreError;
use paceline_events::{event_types, PlatformEvent};
use paceline_store::{Expected, Filter};
use serde::Deserialize;
use uuid::Uuid;

use crate::codec::{decode, encode, ensure_org, load};
use crate::collections;
use crate::context::RequestContext;
use crate::error::ServiceResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBehavior {
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub trackers: Vec<TrackerRule>,
    pub target_value: f64,
    /// Designator-syntax duration, e.g. `"P30D"`.
    pub duration: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Defaults to the kind's rule when omitted.
    #[serde(default)]
    pub completion_approval_required: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollRequest {
    /// Personal target overriding the behavior's nominal one.
    #[serde(default)]
    pub target_value: Option<f64>,
    /// Curve shape name; linear when omitted.
    #[serde(default)]
    pub shape: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogActual {
    pub value: f64,
    /// When the actual was measured; defaults to now.
    #[serde(default)]
    pub logged_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Authoring and lifecycle
// ---------------------------------------------------------------------------

pub async fn create_behavior(
    state: &AppState,
    ctx: &RequestContext,
    input: CreateBehavior,
) -> ServiceResult<Behavior> {
    let kind = BehaviorKind::parse(&input.kind)?;
    let duration = input.duration.parse()?;
    let now = Utc::now();

    // A behavior without explicit tracker rules gets one for the
    // category's default marker at the kind's default cadence.
    let trackers = if input.trackers.is_empty() {
        vec![TrackerRule {
            marker: input.category.marker_default.clone(),
            frequency: kind.default_frequency(),
            method: tracking_methods::MANUAL.to_string(),
            end_date: None,
        }]
    } else {
        input.trackers
    };

    let behavior = Behavior {
        id: Uuid::now_v7(),
        org_id: ctx.org_id,
        kind,
        title: input.title,
        summary: input.summary,
        description: input.description,
        creator_id: ctx.user_id,
        status: BehaviorStatus::Draft,
        category: input.category,
        trackers,
        target_value: input.target_value,
        enrolled: Vec::new(),
        duration,
        tags: input.tags.into_iter().collect(),
        completion_approval_required: input
            .completion_approval_required
            .unwrap_or_else(|| kind.default_completion_approval()),
        created_at: now,
        updated_at: now,
    };
    behavior.validate()?;

    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior.id,
            encode(&behavior)?,
            Expected::Absent,
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::BEHAVIOR_CREATED)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior.id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(
        behavior_id = %behavior.id,
        kind = kind.as_str(),
        "Behavior created"
    );
    Ok(behavior)
}

pub async fn get_behavior(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<Behavior> {
    let (behavior, _): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
    Ok(behavior)
}

pub async fn list_behaviors(
    state: &AppState,
    ctx: &RequestContext,
) -> ServiceResult<Vec<Behavior>> {
    let docs = state
        .store
        .list(
            collections::BEHAVIORS,
            &Filter::new().eq("org_id", ctx.org_id.to_string()),
        )
        .await?;
    docs.iter().map(|(_, doc)| decode(doc)).collect()
}

pub async fn publish_behavior(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<Behavior> {
    transition_behavior(
        state,
        ctx,
        behavior_id,
        BehaviorStatus::Published,
        event_types::BEHAVIOR_PUBLISHED,
    )
    .await
}

pub async fn archive_behavior(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<Behavior> {
    transition_behavior(
        state,
        ctx,
        behavior_id,
        BehaviorStatus::Archived,
        event_types::BEHAVIOR_ARCHIVED,
    )
    .await
}

async fn transition_behavior(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
    to: BehaviorStatus,
    event_type: &str,
) -> ServiceResult<Behavior> {
    let now = Utc::now();
    let (mut behavior, version): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
    if behavior.creator_id != ctx.user_id {
        return Err(CoreError::Forbidden(
            "Only the behavior creator can change its status".to_string(),
        )
        .into());
    }
    behavior.transition_status(to, now)?;
    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior_id,
            encode(&behavior)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_type)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(behavior_id = %behavior_id, status = to.as_str(), "Behavior status changed");
    Ok(behavior)
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// Resolve a requested shape name, applying the configured exponent to
/// exponential curves.
pub(crate) fn resolve_shape(
    state: &AppState,
    name: Option<&str>,
) -> ServiceResult<CurveShape> {
    match name {
        None => Ok(CurveShape::Linear),
        Some(name) => Ok(match curve::parse_shape(name)? {
            CurveShape::Exponential { .. } => CurveShape::Exponential {
                exponent: state.config.curve_exponent,
            },
            shape => shape,
        }),
    }
}

pub async fn enroll(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
    input: EnrollRequest,
) -> ServiceResult<TargetedUser> {
    let now = Utc::now();
    let (mut behavior, version): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;

    let shape = resolve_shape(state, input.shape.as_deref())?;
    let record = behavior
        .enroll(ctx.user_id, input.target_value, shape, now)?
        .clone();

    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior_id,
            encode(&behavior)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::BEHAVIOR_ENROLLED)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(behavior_id = %behavior_id, user_id = %ctx.user_id, "User enrolled");
    Ok(record)
}

pub async fn leave(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<()> {
    let now = Utc::now();
    let (mut behavior, version): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
    behavior.leave(ctx.user_id, now)?;
    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior_id,
            encode(&behavior)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::BEHAVIOR_LEFT)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(behavior_id = %behavior_id, user_id = %ctx.user_id, "User left");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

pub async fn log_actual(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
    input: LogActual,
) -> ServiceResult<ProgressStatus> {
    let now = Utc::now();
    let at = input.logged_at.unwrap_or(now);
    if at > now {
        return Err(CoreError::Validation(
            "Actuals may not be logged in the future".to_string(),
        )
        .into());
    }
    let (mut behavior, version): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;

    behavior.log_actual(ctx.user_id, input.value, at)?;
    let status = behavior.progress_status(ctx.user_id, now)?;

    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior_id,
            encode(&behavior)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::ACTUAL_LOGGED)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior_id)
            .with_actor(ctx.user_id)
            .with_payload(serde_json::json!({ "value": input.value })),
    );
    tracing::debug!(
        behavior_id = %behavior_id,
        user_id = %ctx.user_id,
        value = input.value,
        state = status.state.as_str(),
        "Actual logged"
    );
    Ok(status)
}

pub async fn approve_completion(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
    user_id: EntityId,
) -> ServiceResult<()> {
    let now = Utc::now();
    let (mut behavior, version): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
    behavior.approve_completion(ctx.user_id, user_id, now)?;
    state
        .store
        .put(
            collections::BEHAVIORS,
            behavior_id,
            encode(&behavior)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::COMPLETION_APPROVED)
            .with_org(ctx.org_id)
            .with_subject("behavior", behavior_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(behavior_id = %behavior_id, user_id = %user_id, "Completion approved");
    Ok(())
}

pub async fn progress_status(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<ProgressStatus> {
    let (behavior, _): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
    Ok(behavior.progress_status(ctx.user_id, Utc::now())?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
