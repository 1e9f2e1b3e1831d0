//! Plan and user-plan aggregates.
//!
//! A [`Plan`] owns its day mapping exclusively. A [`UserPlan`] is a
//! per-user materialization holding an independent copy of the days; it
//! can diverge from its source after creation and is replaced wholesale
//! on update (last-writer-wins, no partial-day patching).

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::allocation::Days;
use crate::duration::Span;
use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// PlanStatus
// ---------------------------------------------------------------------------

/// Plan lifecycle. Draft → published, one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Published,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Published => "published",
        }
    }

    /// Returns the set of statuses reachable from this one.
    pub fn valid_transitions(self) -> &'static [PlanStatus] {
        match self {
            PlanStatus::Draft => &[PlanStatus::Published],
            PlanStatus::Published => &[],
        }
    }

    /// Validate a status transition.
    pub fn validate_transition(self, to: PlanStatus) -> Result<(), CoreError> {
        if self.valid_transitions().contains(&to) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Invalid plan status transition: {} -> {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Who can discover a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanVisibility {
    Private,
    Organization,
    Public,
}

impl Default for PlanVisibility {
    fn default() -> Self {
        PlanVisibility::Organization
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A day-structured content schedule, optionally linked to a behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: EntityId,
    pub org_id: EntityId,
    pub name: String,
    pub description: String,
    pub template: bool,
    pub status: PlanStatus,
    pub creator_id: EntityId,
    pub behavior_id: Option<EntityId>,
    pub days: Days,
    pub participants: Vec<EntityId>,
    pub duration: Span,
    pub items_per_day: u32,
    pub tags: BTreeSet<String>,
    pub visibility: PlanVisibility,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Plan {
    /// Validate the aggregate's structural invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Plan name must not be empty".to_string(),
            ));
        }
        if self.items_per_day == 0 {
            return Err(CoreError::Validation(
                "Plan items per day must be positive".to_string(),
            ));
        }
        if self.duration.is_zero() {
            return Err(CoreError::Validation(
                "Plan duration must be non-zero".to_string(),
            ));
        }
        validate_days(&self.days)
    }

    /// Record a participant, keeping the list free of duplicates.
    pub fn add_participant(&mut self, user_id: EntityId, now: Timestamp) {
        if !self.participants.contains(&user_id) {
            self.participants.push(user_id);
            self.updated_at = now;
        }
    }

    /// Move the plan to a new lifecycle status.
    pub fn transition_status(&mut self, to: PlanStatus, now: Timestamp) -> Result<(), CoreError> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Swap in a freshly allocated day mapping.
    pub fn replace_days(&mut self, days: Days, now: Timestamp) -> Result<(), CoreError> {
        validate_days(&days)?;
        self.days = days;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UserPlan
// ---------------------------------------------------------------------------

/// A user's own copy of a plan (or of a plan generated from a behavior).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPlan {
    pub id: EntityId,
    pub org_id: EntityId,
    pub user_id: EntityId,
    pub source_plan_id: Option<EntityId>,
    pub behavior_id: Option<EntityId>,
    pub days: Days,
    pub joined_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserPlan {
    /// Materialize a user's copy of a plan. The day mapping is cloned;
    /// later divergence never writes back into the source.
    pub fn from_plan(plan: &Plan, user_id: EntityId, now: Timestamp) -> Self {
        UserPlan {
            id: uuid::Uuid::now_v7(),
            org_id: plan.org_id,
            user_id,
            source_plan_id: Some(plan.id),
            behavior_id: plan.behavior_id,
            days: plan.days.clone(),
            joined_at: now,
            updated_at: now,
        }
    }

    /// Replace the day mapping wholesale.
    pub fn replace_days(&mut self, days: Days, now: Timestamp) -> Result<(), CoreError> {
        validate_days(&days)?;
        self.days = days;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Day mapping invariants
// ---------------------------------------------------------------------------

/// Check that day indices run contiguously from 1 and that no content id
/// appears twice within a single day.
pub fn validate_days(days: &Days) -> Result<(), CoreError> {
    for (position, index) in days.keys().enumerate() {
        let expected = position as u32 + 1;
        if *index != expected {
            return Err(CoreError::Validation(format!(
                "Day indices must be contiguous from 1; expected {expected}, found {index}"
            )));
        }
    }
    for (index, items) in days {
        let mut seen: HashSet<EntityId> = HashSet::with_capacity(items.len());
        for item in items {
            if !seen.insert(item.content_id) {
                return Err(CoreError::Validation(format!(
                    "Content {} appears twice on day {index}",
                    item.content_id
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
