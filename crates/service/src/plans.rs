//! Plan operations: generation, lifecycle, and per-user materializations.

use chrono::Utc;
use paceline_core::allocation::{self, Days};
use paceline_core::behavior::Behavior;
use paceline_core::duration::Span;
use paceline_core::plan::{Plan, PlanStatus, PlanVisibility, UserPlan};
use paceline_core::types::{EntityId, Timestamp};
use paceline_core::CoreError;
use paceline_events::{event_types, PlatformEvent};
use paceline_store::{Expected, Filter};
use serde::Deserialize;
use serde_json::Value;
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
pub struct CreatePlan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Designator-syntax duration; the day count derives from it.
    pub duration: String,
    /// Defaults to the configured items-per-day when omitted.
    #[serde(default)]
    pub items_per_day: Option<u32>,
    /// Linking a behavior seeds allocation with its category.
    #[serde(default)]
    pub behavior_id: Option<EntityId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Option<PlanVisibility>,
    #[serde(default)]
    pub template: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserPlan {
    /// Copy an existing plan's days.
    #[serde(default)]
    pub plan_id: Option<EntityId>,
    /// Or generate a fresh plan from a behavior's category.
    #[serde(default)]
    pub behavior_id: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Allocation helpers
// ---------------------------------------------------------------------------

fn checked_day_count(
    state: &AppState,
    duration: &Span,
    anchor: Timestamp,
) -> ServiceResult<u32> {
    let days = duration.day_count(anchor)?;
    let max = state.config.max_plan_days as i64;
    if days > max {
        return Err(CoreError::Validation(format!(
            "Plan would span {days} days, maximum is {max}"
        ))
        .into());
    }
    Ok(days as u32)
}

async fn seed_categories_for(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: Option<EntityId>,
) -> ServiceResult<Vec<EntityId>> {
    match behavior_id {
        Some(behavior_id) => {
            let (behavior, _): (Behavior, u64) =
                load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
            ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;
            Ok(vec![behavior.category.reference])
        }
        None => Ok(Vec::new()),
    }
}

async fn allocate_days(
    state: &AppState,
    ctx: &RequestContext,
    day_count: u32,
    items_per_day: u32,
    seeds: &[EntityId],
) -> ServiceResult<Days> {
    let catalog = state.catalog.by_category(ctx.org_id).await?;
    let days = allocation::allocate(&catalog, day_count, items_per_day, seeds)?;
    let short = allocation::short_day_count(&days, items_per_day);
    if short > 0 {
        tracing::warn!(
            org_id = %ctx.org_id,
            short_days = short,
            "Catalog smaller than demand; trailing days are short"
        );
    }
    Ok(days)
}

// ---------------------------------------------------------------------------
// Plan authoring and lifecycle
// ---------------------------------------------------------------------------

pub async fn create_plan(
    state: &AppState,
    ctx: &RequestContext,
    input: CreatePlan,
) -> ServiceResult<Plan> {
    let duration: Span = input.duration.parse()?;
    let now = Utc::now();
    let day_count = checked_day_count(state, &duration, now)?;
    let items_per_day = input
        .items_per_day
        .unwrap_or(state.config.default_items_per_day);
    let seeds = seed_categories_for(state, ctx, input.behavior_id).await?;
    let days = allocate_days(state, ctx, day_count, items_per_day, &seeds).await?;

    let plan = Plan {
        id: Uuid::now_v7(),
        org_id: ctx.org_id,
        name: input.name,
        description: input.description,
        template: input.template,
        status: PlanStatus::Draft,
        creator_id: ctx.user_id,
        behavior_id: input.behavior_id,
        days,
        participants: Vec::new(),
        duration,
        items_per_day,
        tags: input.tags.into_iter().collect(),
        visibility: input.visibility.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    plan.validate()?;

    state
        .store
        .put(collections::PLANS, plan.id, encode(&plan)?, Expected::Absent)
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::PLAN_CREATED)
            .with_org(ctx.org_id)
            .with_subject("plan", plan.id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(plan_id = %plan.id, day_count = day_count, "Plan created");
    Ok(plan)
}

pub async fn get_plan(
    state: &AppState,
    ctx: &RequestContext,
    plan_id: EntityId,
) -> ServiceResult<Plan> {
    let (plan, _): (Plan, u64) = load(state, collections::PLANS, plan_id, "Plan").await?;
    ensure_org("Plan", plan_id, plan.org_id, ctx)?;
    Ok(plan)
}

pub async fn list_plans(state: &AppState, ctx: &RequestContext) -> ServiceResult<Vec<Plan>> {
    let docs = state
        .store
        .list(
            collections::PLANS,
            &Filter::new().eq("org_id", ctx.org_id.to_string()),
        )
        .await?;
    docs.iter().map(|(_, doc)| decode(doc)).collect()
}

pub async fn publish_plan(
    state: &AppState,
    ctx: &RequestContext,
    plan_id: EntityId,
) -> ServiceResult<Plan> {
    let now = Utc::now();
    let (mut plan, version): (Plan, u64) =
        load(state, collections::PLANS, plan_id, "Plan").await?;
    ensure_org("Plan", plan_id, plan.org_id, ctx)?;
    if plan.creator_id != ctx.user_id {
        return Err(CoreError::Forbidden(
            "Only the plan creator can change its status".to_string(),
        )
        .into());
    }
    plan.transition_status(PlanStatus::Published, now)?;
    state
        .store
        .put(
            collections::PLANS,
            plan_id,
            encode(&plan)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::PLAN_PUBLISHED)
            .with_org(ctx.org_id)
            .with_subject("plan", plan_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(plan_id = %plan_id, "Plan published");
    Ok(plan)
}

/// Re-run allocation for a plan against the current catalog.
///
/// The day count stays anchored at the plan's creation time, so with an
/// unchanged catalog the regenerated mapping is identical to the stored
/// one.
pub async fn regenerate_days(
    state: &AppState,
    ctx: &RequestContext,
    plan_id: EntityId,
) -> ServiceResult<Plan> {
    let now = Utc::now();
    let (mut plan, version): (Plan, u64) =
        load(state, collections::PLANS, plan_id, "Plan").await?;
    ensure_org("Plan", plan_id, plan.org_id, ctx)?;

    let day_count = checked_day_count(state, &plan.duration, plan.created_at)?;
    let seeds = seed_categories_for(state, ctx, plan.behavior_id).await?;
    let days = allocate_days(state, ctx, day_count, plan.items_per_day, &seeds).await?;

    plan.replace_days(days, now)?;
    state
        .store
        .put(
            collections::PLANS,
            plan_id,
            encode(&plan)?,
            Expected::Version(version),
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::PLAN_DAYS_REGENERATED)
            .with_org(ctx.org_id)
            .with_subject("plan", plan_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(plan_id = %plan_id, "Plan days regenerated");
    Ok(plan)
}

// ---------------------------------------------------------------------------
// User plans
// ---------------------------------------------------------------------------

/// Create or refresh the caller's copy of a plan and record them as a
/// participant. Shared by explicit creation and share-join.
pub(crate) async fn join_plan(
    state: &AppState,
    ctx: &RequestContext,
    plan_id: EntityId,
) -> ServiceResult<UserPlan> {
    let now = Utc::now();
    let (mut plan, plan_version): (Plan, u64) =
        load(state, collections::PLANS, plan_id, "Plan").await?;
    ensure_org("Plan", plan_id, plan.org_id, ctx)?;

    let existing = state
        .store
        .list(
            collections::USER_PLANS,
            &Filter::new()
                .eq("user_id", ctx.user_id.to_string())
                .eq("source_plan_id", plan_id.to_string()),
        )
        .await?;

    let (user_plan, created) = match existing.first() {
        Some((id, doc)) => {
            let mut user_plan: UserPlan = decode(doc)?;
            user_plan.replace_days(plan.days.clone(), now)?;
            state
                .store
                .put(
                    collections::USER_PLANS,
                    *id,
                    encode(&user_plan)?,
                    Expected::Version(doc.version),
                )
                .await?;
            (user_plan, None)
        }
        None => {
            let user_plan = UserPlan::from_plan(&plan, ctx.user_id, now);
            state
                .store
                .put(
                    collections::USER_PLANS,
                    user_plan.id,
                    encode(&user_plan)?,
                    Expected::Absent,
                )
                .await?;
            let id = user_plan.id;
            (user_plan, Some(id))
        }
    };

    plan.add_participant(ctx.user_id, now);
    let participant_write = state
        .store
        .put(
            collections::PLANS,
            plan_id,
            encode(&plan)?,
            Expected::Version(plan_version),
        )
        .await;
    if let Err(err) = participant_write {
        // Roll back a copy we just created so the join stays all-or-nothing.
        if let Some(id) = created {
            if let Err(cleanup) = state.store.delete(collections::USER_PLANS, id).await {
                tracing::error!(
                    plan_id = %plan_id,
                    user_plan_id = %id,
                    error = %cleanup,
                    "Failed to roll back user plan after participant write failed"
                );
            }
        }
        return Err(err.into());
    }

    tracing::info!(plan_id = %plan_id, user_id = %ctx.user_id, "User joined plan");
    Ok(user_plan)
}

pub async fn create_user_plan(
    state: &AppState,
    ctx: &RequestContext,
    input: CreateUserPlan,
) -> ServiceResult<UserPlan> {
    let user_plan = match (input.plan_id, input.behavior_id) {
        (Some(plan_id), None) => join_plan(state, ctx, plan_id).await?,
        (None, Some(behavior_id)) => user_plan_from_behavior(state, ctx, behavior_id).await?,
        _ => {
            return Err(CoreError::Validation(
                "Exactly one of plan_id or behavior_id is required".to_string(),
            )
            .into())
        }
    };
    state.events.publish(
        PlatformEvent::new(event_types::USER_PLAN_CREATED)
            .with_org(ctx.org_id)
            .with_subject("user_plan", user_plan.id)
            .with_actor(ctx.user_id),
    );
    Ok(user_plan)
}

/// Generate a personal plan straight from a behavior: day count from the
/// behavior's duration, allocation seeded with its category.
async fn user_plan_from_behavior(
    state: &AppState,
    ctx: &RequestContext,
    behavior_id: EntityId,
) -> ServiceResult<UserPlan> {
    let now = Utc::now();
    let (behavior, _): (Behavior, u64) =
        load(state, collections::BEHAVIORS, behavior_id, "Behavior").await?;
    ensure_org("Behavior", behavior_id, behavior.org_id, ctx)?;

    let day_count = checked_day_count(state, &behavior.duration, now)?;
    let items_per_day = state.config.default_items_per_day;
    let seeds = vec![behavior.category.reference];
    let days = allocate_days(state, ctx, day_count, items_per_day, &seeds).await?;

    let existing = state
        .store
        .list(
            collections::USER_PLANS,
            &Filter::new()
                .eq("user_id", ctx.user_id.to_string())
                .eq("behavior_id", behavior_id.to_string())
                .eq("source_plan_id", Value::Null),
        )
        .await?;

    match existing.first() {
        Some((id, doc)) => {
            let mut user_plan: UserPlan = decode(doc)?;
            user_plan.replace_days(days, now)?;
            state
                .store
                .put(
                    collections::USER_PLANS,
                    *id,
                    encode(&user_plan)?,
                    Expected::Version(doc.version),
                )
                .await?;
            Ok(user_plan)
        }
        None => {
            let user_plan = UserPlan {
                id: Uuid::now_v7(),
                org_id: ctx.org_id,
                user_id: ctx.user_id,
                source_plan_id: None,
                behavior_id: Some(behavior_id),
                days,
                joined_at: now,
                updated_at: now,
            };
            state
                .store
                .put(
                    collections::USER_PLANS,
                    user_plan.id,
                    encode(&user_plan)?,
                    Expected::Absent,
                )
                .await?;
            tracing::info!(
                behavior_id = %behavior_id,
                user_id = %ctx.user_id,
                "User plan generated from behavior"
            );
            Ok(user_plan)
        }
    }
}

pub async fn get_user_plan(
    state: &AppState,
    ctx: &RequestContext,
    user_plan_id: EntityId,
) -> ServiceResult<UserPlan> {
    let (user_plan, _): (UserPlan, u64) =
        load(state, collections::USER_PLANS, user_plan_id, "UserPlan").await?;
    ensure_org("UserPlan", user_plan_id, user_plan.org_id, ctx)?;
    if user_plan.user_id != ctx.user_id {
        return Err(CoreError::NotFound {
            entity: "UserPlan",
            id: user_plan_id,
        }
        .into());
    }
    Ok(user_plan)
}

pub async fn list_user_plans(
    state: &AppState,
    ctx: &RequestContext,
) -> ServiceResult<Vec<UserPlan>> {
    let docs = state
        .store
        .list(
            collections::USER_PLANS,
            &Filter::new().eq("user_id", ctx.user_id.to_string()),
        )
        .await?;
    docs.iter().map(|(_, doc)| decode(doc)).collect()
}

/// Replace a user plan's day mapping wholesale. Last writer wins — there
/// is no partial-day patching contract.
pub async fn update_user_plan_days(
    state: &AppState,
    ctx: &RequestContext,
    user_plan_id: EntityId,
    days: Days,
) -> ServiceResult<UserPlan> {
    let now = Utc::now();
    let mut user_plan = get_user_plan(state, ctx, user_plan_id).await?;
    user_plan.replace_days(days, now)?;
    state
        .store
        .put(
            collections::USER_PLANS,
            user_plan_id,
            encode(&user_plan)?,
            Expected::Any,
        )
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::USER_PLAN_UPDATED)
            .with_org(ctx.org_id)
            .with_subject("user_plan", user_plan_id)
            .with_actor(ctx.user_id),
    );
    tracing::debug!(user_plan_id = %user_plan_id, "User plan days replaced");
    Ok(user_plan)
}

pub async fn delete_user_plan(
    state: &AppState,
    ctx: &RequestContext,
    user_plan_id: EntityId,
) -> ServiceResult<()> {
    // Ownership check before the destructive write.
    get_user_plan(state, ctx, user_plan_id).await?;
    state
        .store
        .delete(collections::USER_PLANS, user_plan_id)
        .await?;
    state.events.publish(
        PlatformEvent::new(event_types::USER_PLAN_DELETED)
            .with_org(ctx.org_id)
            .with_subject("user_plan", user_plan_id)
            .with_actor(ctx.user_id),
    );
    tracing::info!(user_plan_id = %user_plan_id, "User plan deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testing;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;

    fn plan_input(days: &str) -> CreatePlan {
        CreatePlan {
            name: "Kickstart".to_string(),
            description: String::new(),
            duration: days.to_string(),
            items_per_day: Some(2),
            behavior_id: None,
            tags: vec!["fitness".to_string()],
            visibility: None,
            template: false,
        }
    }

    #[tokio::test]
    async fn create_plan_allocates_full_days() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 3, 4).await;

        let plan = create_plan(&state, &ctx, plan_input("P4D")).await.unwrap();
        assert_eq!(plan.days.len(), 4);
        for (day, items) in &plan.days {
            assert_eq!(items.len(), 2, "day {day} should hold two items");
        }
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[tokio::test]
    async fn create_plan_with_empty_catalog_fails() {
        let (state, _handles) = AppState::in_memory();
        let ctx = testing::ctx();
        let err = create_plan(&state, &ctx, plan_input("P4D")).await.unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::EmptyCatalog));
    }

    #[tokio::test]
    async fn create_plan_rejects_excessive_span() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 1, 2).await;
        let err = create_plan(&state, &ctx, plan_input("P2Y"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn regeneration_is_idempotent() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 3, 5).await;

        let plan = create_plan(&state, &ctx, plan_input("P5D")).await.unwrap();
        let first = regenerate_days(&state, &ctx, plan.id).await.unwrap();
        let second = regenerate_days(&state, &ctx, plan.id).await.unwrap();
        assert_eq!(first.days, plan.days);
        assert_eq!(second.days, first.days);
    }

    #[tokio::test]
    async fn behavior_seeded_plan_leads_with_its_category() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        let categories = testing::seed_catalog(&handles, ctx.org_id, 3, 4).await;
        let behavior =
            testing::published_behavior_in_category(&state, &ctx, categories[2]).await;

        let mut input = plan_input("P4D");
        input.behavior_id = Some(behavior.id);
        let plan = create_plan(&state, &ctx, input).await.unwrap();
        assert_eq!(plan.days[&1][0].category_id, categories[2]);
    }

    #[tokio::test]
    async fn publish_plan_is_one_way() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 2, 4).await;
        let plan = create_plan(&state, &ctx, plan_input("P2D")).await.unwrap();

        let published = publish_plan(&state, &ctx, plan.id).await.unwrap();
        assert_eq!(published.status, PlanStatus::Published);

        let err = publish_plan(&state, &ctx, plan.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn user_plan_copies_and_diverges() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 2, 6).await;
        let plan = create_plan(&state, &ctx, plan_input("P3D")).await.unwrap();

        let user_plan = create_user_plan(
            &state,
            &ctx,
            CreateUserPlan {
                plan_id: Some(plan.id),
                behavior_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(user_plan.days, plan.days);
        assert_eq!(user_plan.source_plan_id, Some(plan.id));

        // Wholesale replacement diverges the copy, not the source.
        let mut replacement: Days = BTreeMap::new();
        replacement.insert(1, plan.days[&2].clone());
        let updated =
            update_user_plan_days(&state, &ctx, user_plan.id, replacement.clone())
                .await
                .unwrap();
        assert_eq!(updated.days, replacement);

        let source = get_plan(&state, &ctx, plan.id).await.unwrap();
        assert_eq!(source.days.len(), 3);
        assert!(source.participants.contains(&ctx.user_id));
    }

    #[tokio::test]
    async fn joining_twice_refreshes_instead_of_duplicating() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 2, 6).await;
        let plan = create_plan(&state, &ctx, plan_input("P3D")).await.unwrap();

        let request = CreateUserPlan {
            plan_id: Some(plan.id),
            behavior_id: None,
        };
        let first = create_user_plan(&state, &ctx, request.clone()).await.unwrap();
        let second = create_user_plan(&state, &ctx, request).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(list_user_plans(&state, &ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_plan_generated_from_behavior() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        let categories = testing::seed_catalog(&handles, ctx.org_id, 3, 6).await;
        let behavior =
            testing::published_behavior_in_category(&state, &ctx, categories[1]).await;

        let user_plan = create_user_plan(
            &state,
            &ctx,
            CreateUserPlan {
                plan_id: None,
                behavior_id: Some(behavior.id),
            },
        )
        .await
        .unwrap();
        assert_eq!(user_plan.behavior_id, Some(behavior.id));
        assert!(user_plan.source_plan_id.is_none());
        // 30-day behavior window, capped by catalog size: trailing days
        // are short but present.
        assert_eq!(user_plan.days.len(), 30);
        assert_eq!(user_plan.days[&1][0].category_id, categories[1]);
    }

    #[tokio::test]
    async fn create_user_plan_requires_exactly_one_source() {
        let (state, _handles) = AppState::in_memory();
        let ctx = testing::ctx();
        let err = create_user_plan(&state, &ctx, CreateUserPlan::default())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_user_plan_removes_it() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 2, 4).await;
        let plan = create_plan(&state, &ctx, plan_input("P2D")).await.unwrap();
        let user_plan = create_user_plan(
            &state,
            &ctx,
            CreateUserPlan {
                plan_id: Some(plan.id),
                behavior_id: None,
            },
        )
        .await
        .unwrap();

        delete_user_plan(&state, &ctx, user_plan.id).await.unwrap();
        let err = get_user_plan(&state, &ctx, user_plan.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn user_plans_are_private_to_their_owner() {
        let (state, handles) = AppState::in_memory();
        let ctx = testing::ctx();
        testing::seed_catalog(&handles, ctx.org_id, 2, 4).await;
        let plan = create_plan(&state, &ctx, plan_input("P2D")).await.unwrap();
        let user_plan = create_user_plan(
            &state,
            &ctx,
            CreateUserPlan {
                plan_id: Some(plan.id),
                behavior_id: None,
            },
        )
        .await
        .unwrap();

        let other = RequestContext {
            user_id: Uuid::now_v7(),
            org_id: ctx.org_id,
        };
        let err = get_user_plan(&state, &other, user_plan.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Core(CoreError::NotFound { .. }));
    }
}
