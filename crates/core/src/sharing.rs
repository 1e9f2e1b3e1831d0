//! Share lifecycle: pending → joined / declined.
//!
//! Pure transition logic only. Persistence, the recipient check, and the
//! cross-aggregate enrollment effect of a join live in the service layer,
//! which drives the terminal transition through a version-checked
//! compare-and-set so concurrent responses cannot both win.

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorKind;
use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// ShareKind
// ---------------------------------------------------------------------------

/// What a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    Goal,
    Challenge,
    Habit,
    Plan,
    Content,
    Survey,
}

impl ShareKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareKind::Goal => "goal",
            ShareKind::Challenge => "challenge",
            ShareKind::Habit => "habit",
            ShareKind::Plan => "plan",
            ShareKind::Content => "content",
            ShareKind::Survey => "survey",
        }
    }

    /// Parse from a string, rejecting unknown kinds.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "goal" => Ok(ShareKind::Goal),
            "challenge" => Ok(ShareKind::Challenge),
            "habit" => Ok(ShareKind::Habit),
            "plan" => Ok(ShareKind::Plan),
            "content" => Ok(ShareKind::Content),
            "survey" => Ok(ShareKind::Survey),
            other => Err(CoreError::Validation(format!(
                "Invalid share kind '{other}'. Must be one of: goal, challenge, habit, plan, content, survey"
            ))),
        }
    }

    /// Whether this kind references a behavior aggregate.
    pub fn is_behavior(&self) -> bool {
        matches!(self, ShareKind::Goal | ShareKind::Challenge | ShareKind::Habit)
    }
}

impl From<BehaviorKind> for ShareKind {
    fn from(kind: BehaviorKind) -> Self {
        match kind {
            BehaviorKind::Goal => ShareKind::Goal,
            BehaviorKind::Challenge => ShareKind::Challenge,
            BehaviorKind::Habit => ShareKind::Habit,
        }
    }
}

// ---------------------------------------------------------------------------
// ShareState and decisions
// ---------------------------------------------------------------------------

/// Lifecycle state of a share. Joined and declined are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    Pending,
    Joined,
    Declined,
}

impl ShareState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareState::Pending => "pending",
            ShareState::Joined => "joined",
            ShareState::Declined => "declined",
        }
    }

    /// Terminal states are immutable once set.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ShareState::Pending)
    }
}

/// A recipient's answer to a pending share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareDecision {
    Join,
    Decline,
}

impl ShareDecision {
    /// The terminal state this decision moves the share into.
    pub fn resulting_state(&self) -> ShareState {
        match self {
            ShareDecision::Join => ShareState::Joined,
            ShareDecision::Decline => ShareState::Declined,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingShare
// ---------------------------------------------------------------------------

/// An invitation for a user to join a behavior, plan, or other item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingShare {
    pub id: EntityId,
    pub org_id: EntityId,
    pub kind: ShareKind,
    pub item_id: EntityId,
    pub sender_id: EntityId,
    pub recipient_id: EntityId,
    pub state: ShareState,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

impl PendingShare {
    pub fn new(
        org_id: EntityId,
        kind: ShareKind,
        item_id: EntityId,
        sender_id: EntityId,
        recipient_id: EntityId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            org_id,
            kind,
            item_id,
            sender_id,
            recipient_id,
            state: ShareState::Pending,
            created_at: now,
            responded_at: None,
        }
    }

    /// Apply a decision, producing the terminal record.
    ///
    /// Fails with [`CoreError::AlreadyResponded`] when the share is
    /// already terminal; the caller persists the result with a
    /// compare-and-set so a racing response observes the same failure.
    pub fn respond(&self, decision: ShareDecision, now: Timestamp) -> Result<Self, CoreError> {
        if self.state.is_terminal() {
            return Err(CoreError::AlreadyResponded { share_id: self.id });
        }
        let mut responded = self.clone();
        responded.state = decision.resulting_state();
        responded.responded_at = Some(now);
        Ok(responded)
    }
}

// ---------------------------------------------------------------------------
// Duplicate detection and ordering
// ---------------------------------------------------------------------------

/// Reject a new share when a non-terminal one already exists for the same
/// (kind, item, recipient) triple. Terminal records do not block re-sharing.
pub fn ensure_no_pending(
    existing: &[PendingShare],
    kind: ShareKind,
    item_id: EntityId,
    recipient_id: EntityId,
) -> Result<(), CoreError> {
    let duplicate = existing.iter().any(|share| {
        share.kind == kind
            && share.item_id == item_id
            && share.recipient_id == recipient_id
            && !share.state.is_terminal()
    });
    if duplicate {
        return Err(CoreError::DuplicatePendingShare {
            kind: kind.as_str(),
            item_id,
            recipient_id,
        });
    }
    Ok(())
}

/// Order shares by creation time ascending, ties broken by id so the
/// listing never flaps between identical requests.
pub fn sort_by_creation(shares: &mut [PendingShare]) {
    shares.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn ts(day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 4, day, 12, 0, 0).unwrap()
    }

    fn pending_share() -> PendingShare {
        PendingShare::new(
            Uuid::now_v7(),
            ShareKind::Goal,
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            ts(1),
        )
    }

    // -----------------------------------------------------------------------
    // Kind parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_valid_kinds() {
        assert_eq!(ShareKind::parse("goal").unwrap(), ShareKind::Goal);
        assert_eq!(ShareKind::parse("plan").unwrap(), ShareKind::Plan);
        assert_eq!(ShareKind::parse("survey").unwrap(), ShareKind::Survey);
    }

    #[test]
    fn parse_unknown_kind_rejected() {
        assert!(ShareKind::parse("poll").is_err());
    }

    #[test]
    fn behavior_kinds_map_to_share_kinds() {
        assert_eq!(ShareKind::from(BehaviorKind::Goal), ShareKind::Goal);
        assert_eq!(
            ShareKind::from(BehaviorKind::Challenge),
            ShareKind::Challenge
        );
        assert!(ShareKind::Goal.is_behavior());
        assert!(ShareKind::Habit.is_behavior());
        assert!(!ShareKind::Plan.is_behavior());
        assert!(!ShareKind::Content.is_behavior());
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    #[test]
    fn pending_is_not_terminal() {
        assert!(!ShareState::Pending.is_terminal());
        assert!(ShareState::Joined.is_terminal());
        assert!(ShareState::Declined.is_terminal());
    }

    #[test]
    fn respond_join() {
        let share = pending_share();
        let joined = share.respond(ShareDecision::Join, ts(2)).unwrap();
        assert_eq!(joined.state, ShareState::Joined);
        assert_eq!(joined.responded_at, Some(ts(2)));
        assert_eq!(joined.id, share.id);
    }

    #[test]
    fn respond_decline() {
        let share = pending_share();
        let declined = share.respond(ShareDecision::Decline, ts(2)).unwrap();
        assert_eq!(declined.state, ShareState::Declined);
    }

    #[test]
    fn second_response_fails() {
        let share = pending_share();
        let declined = share.respond(ShareDecision::Decline, ts(2)).unwrap();
        let err = declined.respond(ShareDecision::Join, ts(3)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyResponded { share_id } if share_id == share.id
        ));
    }

    #[test]
    fn joined_is_immutable_too() {
        let share = pending_share();
        let joined = share.respond(ShareDecision::Join, ts(2)).unwrap();
        assert!(joined.respond(ShareDecision::Decline, ts(3)).is_err());
    }

    // -----------------------------------------------------------------------
    // Duplicate detection
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_pending_rejected() {
        let share = pending_share();
        let err =
            ensure_no_pending(&[share.clone()], share.kind, share.item_id, share.recipient_id)
                .unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePendingShare { .. }));
    }

    #[test]
    fn terminal_share_does_not_block_resharing() {
        let share = pending_share();
        let declined = share.respond(ShareDecision::Decline, ts(2)).unwrap();
        assert!(ensure_no_pending(
            &[declined],
            share.kind,
            share.item_id,
            share.recipient_id
        )
        .is_ok());
    }

    #[test]
    fn different_recipient_does_not_block() {
        let share = pending_share();
        assert!(
            ensure_no_pending(&[share.clone()], share.kind, share.item_id, Uuid::now_v7()).is_ok()
        );
    }

    #[test]
    fn different_kind_does_not_block() {
        let share = pending_share();
        assert!(ensure_no_pending(
            &[share.clone()],
            ShareKind::Plan,
            share.item_id,
            share.recipient_id
        )
        .is_ok());
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn sort_orders_by_creation_time() {
        let mut a = pending_share();
        a.created_at = ts(3);
        let mut b = pending_share();
        b.created_at = ts(1);
        let mut c = pending_share();
        c.created_at = ts(2);

        let mut shares = vec![a.clone(), b.clone(), c.clone()];
        sort_by_creation(&mut shares);
        assert_eq!(shares[0].id, b.id);
        assert_eq!(shares[1].id, c.id);
        assert_eq!(shares[2].id, a.id);
    }
}
