//! Meeting records shared by the schedule engine and the dialogue layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TempoError;

// =============================================================================
// MeetingStatus
// =============================================================================

/// Lifecycle of a meeting record. Transitions are not policed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Proposed,
    Confirmed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Proposed => "proposed",
            MeetingStatus::Confirmed => "confirmed",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a meeting in this status occupies its time slot.
    pub fn is_active(&self) -> bool {
        matches!(self, MeetingStatus::Proposed | MeetingStatus::Confirmed)
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingStatus {
    type Err = TempoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(MeetingStatus::Proposed),
            "confirmed" => Ok(MeetingStatus::Confirmed),
            "cancelled" => Ok(MeetingStatus::Cancelled),
            other => Err(TempoError::InvalidInput(format!(
                "unknown meeting status: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Meeting
// =============================================================================

/// A persisted meeting.
///
/// `end_time` is always `start_time + duration_minutes`; both constructors
/// and [`MeetingPatch::apply_to`] maintain that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub organizer_id: String,
    pub participants: Vec<String>,
    pub status: MeetingStatus,
    pub meeting_type: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Organizer followed by participants, without duplicates.
    pub fn attendees(&self) -> Vec<String> {
        let mut all = vec![self.organizer_id.clone()];
        for p in &self.participants {
            if !all.iter().any(|a| a.eq_ignore_ascii_case(p)) {
                all.push(p.clone());
            }
        }
        all
    }

    /// Whether `user_id` organizes or attends this meeting.
    pub fn involves(&self, user_id: &str) -> bool {
        self.organizer_id == user_id || self.participants.iter().any(|p| p == user_id)
    }

    /// Half-open overlap test: `[start, end)` against `[start_time, end_time)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// Input for creating a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeeting {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub organizer_id: String,
    pub participants: Vec<String>,
    pub status: MeetingStatus,
    pub meeting_type: String,
    pub constraints: BTreeMap<String, String>,
}

impl NewMeeting {
    /// A confirmed meeting with the common defaults filled in.
    pub fn new(
        organizer_id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            location: "TBD".to_string(),
            start_time,
            duration_minutes,
            organizer_id: organizer_id.into(),
            participants: Vec::new(),
            status: MeetingStatus::Confirmed,
            meeting_type: "meeting".to_string(),
            constraints: BTreeMap::new(),
        }
    }

    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants = participants;
        self
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Materialize into a record with a fresh id.
    pub fn into_meeting(self, now: DateTime<Utc>) -> Meeting {
        let end_time = self.end_time();
        Meeting {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            location: self.location,
            start_time: self.start_time,
            end_time,
            duration_minutes: self.duration_minutes,
            organizer_id: self.organizer_id,
            participants: self.participants,
            status: self.status,
            meeting_type: self.meeting_type,
            constraints: self.constraints,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a meeting. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub participants: Option<Vec<String>>,
    pub status: Option<MeetingStatus>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.participants.is_none()
            && self.status.is_none()
    }

    /// Apply to `meeting`, recomputing `end_time`.
    pub fn apply_to(&self, meeting: &mut Meeting, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            meeting.title = title.clone();
        }
        if let Some(description) = &self.description {
            meeting.description = description.clone();
        }
        if let Some(location) = &self.location {
            meeting.location = location.clone();
        }
        if let Some(start) = self.start_time {
            meeting.start_time = start;
        }
        if let Some(duration) = self.duration_minutes {
            meeting.duration_minutes = duration;
        }
        if let Some(participants) = &self.participants {
            meeting.participants = participants.clone();
        }
        if let Some(status) = self.status {
            meeting.status = status;
        }
        meeting.end_time =
            meeting.start_time + Duration::minutes(i64::from(meeting.duration_minutes));
        meeting.updated_at = now;
    }
}
