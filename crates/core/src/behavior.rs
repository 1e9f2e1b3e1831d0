//! Behavior aggregate: kinds, lifecycle status, tracking rules, and
//! structural validation.
//!
//! Goals, challenges, and habits share one shape; [`BehaviorKind`] is a
//! discriminant carrying kind-specific defaults rather than three parallel
//! types. Enrollment and progress operations live in
//! [`crate::tracker`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::duration::Span;
use crate::error::CoreError;
use crate::tracker::TargetedUser;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// BehaviorKind
// ---------------------------------------------------------------------------

/// Discriminant for the three behavior flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    Goal,
    Challenge,
    Habit,
}

impl BehaviorKind {
    /// String representation for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Goal => "goal",
            BehaviorKind::Challenge => "challenge",
            BehaviorKind::Habit => "habit",
        }
    }

    /// Parse from a string, rejecting unknown kinds.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "goal" => Ok(BehaviorKind::Goal),
            "challenge" => Ok(BehaviorKind::Challenge),
            "habit" => Ok(BehaviorKind::Habit),
            other => Err(CoreError::Validation(format!(
                "Invalid behavior kind '{other}'. Must be one of: goal, challenge, habit"
            ))),
        }
    }

    /// Whether completions default to requiring creator sign-off.
    /// Challenges are competitive, so they do; goals and habits do not.
    pub fn default_completion_approval(&self) -> bool {
        matches!(self, BehaviorKind::Challenge)
    }

    /// Default logging cadence for trackers of this kind.
    pub fn default_frequency(&self) -> Frequency {
        match self {
            BehaviorKind::Goal => Frequency::Weekly,
            BehaviorKind::Challenge | BehaviorKind::Habit => Frequency::Daily,
        }
    }
}

// ---------------------------------------------------------------------------
// BehaviorStatus
// ---------------------------------------------------------------------------

/// Lifecycle status. Transitions are monotonic:
/// draft → published → archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorStatus {
    Draft,
    Published,
    Archived,
}

impl BehaviorStatus {
    /// String representation for storage and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorStatus::Draft => "draft",
            BehaviorStatus::Published => "published",
            BehaviorStatus::Archived => "archived",
        }
    }

    /// Returns the set of statuses reachable from this one.
    pub fn valid_transitions(self) -> &'static [BehaviorStatus] {
        match self {
            BehaviorStatus::Draft => &[BehaviorStatus::Published],
            BehaviorStatus::Published => &[BehaviorStatus::Archived],
            BehaviorStatus::Archived => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: BehaviorStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a status transition, with a descriptive error for invalid
    /// ones.
    pub fn validate_transition(self, to: BehaviorStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Invalid status transition: {} -> {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// Expected logging cadence for a tracker rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Parse from a string, rejecting unknown cadences.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(CoreError::Validation(format!(
                "Invalid frequency '{other}'. Must be one of: daily, weekly, monthly, quarterly, yearly"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking methods
// ---------------------------------------------------------------------------

/// Known ways an actual can be captured.
pub mod tracking_methods {
    /// User types the value in.
    pub const MANUAL: &str = "manual";
    /// Value streams in from a connected device.
    pub const DEVICE: &str = "device";
    /// Value arrives through a bulk import.
    pub const IMPORTED: &str = "imported";
}

/// The set of all valid tracking methods.
pub const VALID_TRACKING_METHODS: &[&str] = &[
    tracking_methods::MANUAL,
    tracking_methods::DEVICE,
    tracking_methods::IMPORTED,
];

/// Returns `true` if the given tracking method is valid.
pub fn is_valid_tracking_method(method: &str) -> bool {
    VALID_TRACKING_METHODS.contains(&method)
}

// ---------------------------------------------------------------------------
// Category and tracker rules
// ---------------------------------------------------------------------------

/// The measurable category a behavior belongs to. The markers are the
/// units actuals are logged in (e.g. "steps", "kg").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Id of the category directory entry this behavior references.
    pub reference: EntityId,
    /// The default marker for the category.
    pub marker_default: String,
    /// Alternative markers a tracker rule may bind instead.
    pub marker_alternatives: Vec<String>,
}

impl Category {
    /// Whether a marker is the default or one of the alternatives.
    pub fn supports_marker(&self, marker: &str) -> bool {
        self.marker_default == marker
            || self.marker_alternatives.iter().any(|m| m == marker)
    }
}

/// A rule binding a marker to a logging cadence and capture method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRule {
    pub marker: String,
    pub frequency: Frequency,
    pub method: String,
    pub end_date: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// A trackable behavior authored by an organization.
///
/// Owns its enrollment set exclusively; all mutation goes through the
/// operations in [`crate::tracker`] and [`Behavior::transition_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    pub id: EntityId,
    pub org_id: EntityId,
    pub kind: BehaviorKind,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub creator_id: EntityId,
    pub status: BehaviorStatus,
    pub category: Category,
    pub trackers: Vec<TrackerRule>,
    /// The nominal, organization-level target. Individual enrollments may
    /// carry their own override.
    pub target_value: f64,
    pub enrolled: Vec<TargetedUser>,
    pub duration: Span,
    pub tags: BTreeSet<String>,
    pub completion_approval_required: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Behavior {
    /// Validate the aggregate's structural invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation(
                "Behavior title must not be empty".to_string(),
            ));
        }
        if !self.target_value.is_finite() || self.target_value <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Behavior target must be positive, got {}",
                self.target_value
            )));
        }
        if self.duration.is_zero() {
            return Err(CoreError::Validation(
                "Behavior duration must be non-zero".to_string(),
            ));
        }
        for rule in &self.trackers {
            if !self.category.supports_marker(&rule.marker) {
                return Err(CoreError::Validation(format!(
                    "Tracker marker '{}' is not supported by the category (default '{}')",
                    rule.marker, self.category.marker_default
                )));
            }
            if !is_valid_tracking_method(&rule.method) {
                return Err(CoreError::Validation(format!(
                    "Invalid tracking method '{}'. Must be one of: {}",
                    rule.method,
                    VALID_TRACKING_METHODS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Move the behavior to a new lifecycle status.
    pub fn transition_status(
        &mut self,
        to: BehaviorStatus,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
