//! Dialogue state and reply types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tempo_core::types::Meeting;
use tempo_schedule::{RescheduledMeeting, UnresolvedConflict};

use crate::extract::{MeetingIntent, MissingField};
use crate::intent::Intent;

/// A meeting referenced from a pending action. The id is authoritative;
/// the rest is a display snapshot taken when the action was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRef {
    pub id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl From<&Meeting> for MeetingRef {
    fn from(meeting: &Meeting) -> Self {
        Self {
            id: meeting.id,
            title: meeting.title.clone(),
            start_time: meeting.start_time,
            duration_minutes: meeting.duration_minutes,
        }
    }
}

// =============================================================================
// Pending actions
// =============================================================================

/// The one thing a user's conversation is waiting on, if anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingAction {
    AwaitingCreateDetails {
        partial: MeetingIntent,
        missing: Vec<MissingField>,
    },
    AwaitingCreateConfirmation {
        proposal: MeetingIntent,
    },
    AwaitingMeetingSelectionForUpdate {
        candidates: Vec<MeetingRef>,
    },
    AwaitingUpdateDetails {
        target: MeetingRef,
    },
    AwaitingMeetingSelectionForDelete {
        candidates: Vec<MeetingRef>,
    },
    AwaitingDeleteConfirmation {
        target: MeetingRef,
    },
    AwaitingDeleteAllConfirmation {
        count: usize,
    },
}

impl PendingAction {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingAction::AwaitingCreateDetails { .. } => PendingKind::AwaitingCreateDetails,
            PendingAction::AwaitingCreateConfirmation { .. } => {
                PendingKind::AwaitingCreateConfirmation
            }
            PendingAction::AwaitingMeetingSelectionForUpdate { .. } => {
                PendingKind::AwaitingMeetingSelectionForUpdate
            }
            PendingAction::AwaitingUpdateDetails { .. } => PendingKind::AwaitingUpdateDetails,
            PendingAction::AwaitingMeetingSelectionForDelete { .. } => {
                PendingKind::AwaitingMeetingSelectionForDelete
            }
            PendingAction::AwaitingDeleteConfirmation { .. } => {
                PendingKind::AwaitingDeleteConfirmation
            }
            PendingAction::AwaitingDeleteAllConfirmation { .. } => {
                PendingKind::AwaitingDeleteAllConfirmation
            }
        }
    }
}

/// Data-free tag of a [`PendingAction`], reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    AwaitingCreateDetails,
    AwaitingCreateConfirmation,
    AwaitingMeetingSelectionForUpdate,
    AwaitingUpdateDetails,
    AwaitingMeetingSelectionForDelete,
    AwaitingDeleteConfirmation,
    AwaitingDeleteAllConfirmation,
}

// =============================================================================
// Reply
// =============================================================================

/// Result of one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub message: String,
    /// Classified intent, when the turn was not resolving a pending action.
    pub intent: Option<Intent>,
    /// What the conversation is waiting on after this turn.
    pub pending: Option<PendingKind>,
    /// Meetings created, changed or listed by this turn.
    pub meetings: Vec<Meeting>,
    pub rescheduled: Vec<RescheduledMeeting>,
    pub unresolved_conflicts: Vec<UnresolvedConflict>,
}
