//! Per-enrollment progress tracking.
//!
//! A [`TargetedUser`] record ties a user to a behavior with an optional
//! target override and a chosen curve shape. State is derived, never
//! stored: an enrollment is `Enrolled` until the first actual is logged,
//! then `Active` until it either reaches the effective target
//! (`Completed`, gated on creator approval when the behavior requires it)
//! or outlives its window without reaching it (`Lapsed`).

use serde::{Deserialize, Serialize};

use crate::behavior::{Behavior, BehaviorStatus};
use crate::curve::{self, CurveShape};
use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The latest logged actual for an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualEntry {
    pub value: f64,
    pub logged_at: Timestamp,
}

/// A user's enrollment against a behavior's target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedUser {
    pub user_id: EntityId,
    /// Overrides the behavior's nominal target when present.
    pub target_value: Option<f64>,
    pub shape: CurveShape,
    pub joined_at: Timestamp,
    pub left_at: Option<Timestamp>,
    pub latest_actual: Option<ActualEntry>,
    pub completion_approved: bool,
}

impl TargetedUser {
    /// An enrollment is active until the user leaves.
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Derived lifecycle state of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Enrolled,
    Active,
    Completed,
    Lapsed,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Enrolled => "enrolled",
            TrackerState::Active => "active",
            TrackerState::Completed => "completed",
            TrackerState::Lapsed => "lapsed",
        }
    }
}

/// Snapshot of a user's progress at a point in time.
/// `delta` is actual − expected; positive means ahead of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressStatus {
    pub expected: f64,
    pub actual: f64,
    pub delta: f64,
    pub state: TrackerState,
}

// ---------------------------------------------------------------------------
// Enrollment operations
// ---------------------------------------------------------------------------

impl Behavior {
    /// The active enrollment record for a user, if any.
    pub fn active_enrollment(&self, user_id: EntityId) -> Option<&TargetedUser> {
        self.enrolled
            .iter()
            .find(|record| record.user_id == user_id && record.is_active())
    }

    /// Enroll a user, or reactivate a previously-left enrollment.
    ///
    /// Only published behaviors accept enrollments; a draft has not been
    /// released and an archived behavior rejects newcomers. Reactivation
    /// starts a fresh window: new join timestamp, cleared actuals and
    /// approval.
    pub fn enroll(
        &mut self,
        user_id: EntityId,
        target_value: Option<f64>,
        shape: CurveShape,
        now: Timestamp,
    ) -> Result<&TargetedUser, CoreError> {
        match self.status {
            BehaviorStatus::Published => {}
            BehaviorStatus::Draft => {
                return Err(CoreError::Validation(
                    "Behavior must be published before users can enroll".to_string(),
                ))
            }
            BehaviorStatus::Archived => {
                return Err(CoreError::Validation(
                    "Archived behaviors do not accept new enrollments".to_string(),
                ))
            }
        }
        if let Some(target) = target_value {
            if !target.is_finite() || target <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "Enrollment target override must be positive, got {target}"
                )));
            }
        }
        curve::validate_shape(&shape)?;
        if self.active_enrollment(user_id).is_some() {
            return Err(CoreError::Conflict(format!(
                "User {user_id} is already enrolled"
            )));
        }

        let index = match self.enrolled.iter().position(|r| r.user_id == user_id) {
            Some(index) => {
                let record = &mut self.enrolled[index];
                record.target_value = target_value.or(record.target_value);
                record.shape = shape;
                record.joined_at = now;
                record.left_at = None;
                record.latest_actual = None;
                record.completion_approved = false;
                index
            }
            None => {
                self.enrolled.push(TargetedUser {
                    user_id,
                    target_value,
                    shape,
                    joined_at: now,
                    left_at: None,
                    latest_actual: None,
                    completion_approved: false,
                });
                self.enrolled.len() - 1
            }
        };
        self.updated_at = now;
        Ok(&self.enrolled[index])
    }

    /// Mark a user's enrollment as left.
    pub fn leave(&mut self, user_id: EntityId, now: Timestamp) -> Result<(), CoreError> {
        let behavior_id = self.id;
        let record = self
            .enrolled
            .iter_mut()
            .find(|record| record.user_id == user_id && record.is_active())
            .ok_or(CoreError::NotEnrolled {
                behavior_id,
                user_id,
            })?;
        record.left_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record a logged actual for a user's active enrollment.
    ///
    /// Only the newest entry is kept; an entry older than the current one
    /// is ignored (late-arriving device syncs).
    pub fn log_actual(
        &mut self,
        user_id: EntityId,
        value: f64,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::Validation(format!(
                "Logged actual must be non-negative, got {value}"
            )));
        }
        let behavior_id = self.id;
        let record = self
            .enrolled
            .iter_mut()
            .find(|record| record.user_id == user_id && record.is_active())
            .ok_or(CoreError::NotEnrolled {
                behavior_id,
                user_id,
            })?;
        let stale = matches!(&record.latest_actual, Some(current) if current.logged_at > at);
        if !stale {
            record.latest_actual = Some(ActualEntry {
                value,
                logged_at: at,
            });
        }
        self.updated_at = at;
        Ok(())
    }

    /// Record the creator's completion sign-off for a user's enrollment.
    pub fn approve_completion(
        &mut self,
        approver_id: EntityId,
        user_id: EntityId,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if approver_id != self.creator_id {
            return Err(CoreError::Forbidden(
                "Only the behavior creator can approve completion".to_string(),
            ));
        }
        let behavior_id = self.id;
        let record = self
            .enrolled
            .iter_mut()
            .find(|record| record.user_id == user_id && record.is_active())
            .ok_or(CoreError::NotEnrolled {
                behavior_id,
                user_id,
            })?;
        record.completion_approved = true;
        self.updated_at = now;
        Ok(())
    }

    /// The target an enrollment is measured against.
    pub fn effective_target(&self, record: &TargetedUser) -> f64 {
        record.target_value.unwrap_or(self.target_value)
    }

    /// Evaluate a user's progress at `now`.
    pub fn progress_status(
        &self,
        user_id: EntityId,
        now: Timestamp,
    ) -> Result<ProgressStatus, CoreError> {
        let record = self
            .active_enrollment(user_id)
            .ok_or(CoreError::NotEnrolled {
                behavior_id: self.id,
                user_id,
            })?;
        let target = self.effective_target(record);
        let fraction = self.duration.elapsed_fraction(record.joined_at, now)?;
        let expected = curve::expected_at(target, fraction, &record.shape)?;
        let actual = record.latest_actual.map(|entry| entry.value).unwrap_or(0.0);

        let state = match &record.latest_actual {
            None => TrackerState::Enrolled,
            Some(entry) => {
                let reached = entry.value >= target;
                let approved = !self.completion_approval_required || record.completion_approved;
                if reached && approved {
                    TrackerState::Completed
                } else if !reached && now > self.duration.end(record.joined_at)? {
                    TrackerState::Lapsed
                } else {
                    TrackerState::Active
                }
            }
        };

        Ok(ProgressStatus {
            expected,
            actual,
            delta: actual - expected,
            state,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
