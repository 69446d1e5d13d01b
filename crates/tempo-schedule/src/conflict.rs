//! Overlap detection against a user's existing bookings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tempo_core::types::Meeting;

use crate::error::StoreError;
use crate::store::MeetingStore;

/// Finds a user's active meetings that overlap a time interval.
#[derive(Clone)]
pub struct ConflictDetector {
    store: Arc<dyn MeetingStore>,
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn MeetingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MeetingStore> {
        &self.store
    }

    /// Every proposed or confirmed meeting of `user_id` (as organizer or
    /// participant) with `existing.start < end && existing.end > start`.
    pub async fn conflicts_for(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let meetings = self.store.list_for_user(user_id, None).await?;
        Ok(overlapping(meetings, start, end, None))
    }

    /// Like [`Self::conflicts_for`] but ignores one meeting (typically the
    /// meeting being placed or moved).
    pub async fn conflicts_excluding(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Uuid,
    ) -> Result<Vec<Meeting>, StoreError> {
        let meetings = self.store.list_for_user(user_id, None).await?;
        Ok(overlapping(meetings, start, end, Some(exclude)))
    }

    /// Whether every user in `attendees` is free over `[start, end)`.
    pub async fn all_free(
        &self,
        attendees: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        for user in attendees {
            if !self.conflicts_for(user, start, end).await?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Load the active bookings of every attendee once, for repeated probing.
    pub async fn snapshot(&self, attendees: &[String]) -> Result<BusySnapshot, StoreError> {
        let mut meetings: Vec<Meeting> = Vec::new();
        for user in attendees {
            for m in self.store.list_for_user(user, None).await? {
                if m.status.is_active() && !meetings.iter().any(|seen| seen.id == m.id) {
                    meetings.push(m);
                }
            }
        }
        Ok(BusySnapshot { meetings })
    }
}

/// Active bookings of a fixed attendee set at one point in time.
#[derive(Debug, Clone, Default)]
pub struct BusySnapshot {
    meetings: Vec<Meeting>,
}

impl BusySnapshot {
    pub fn from_meetings(meetings: Vec<Meeting>) -> Self {
        Self {
            meetings: meetings.into_iter().filter(|m| m.status.is_active()).collect(),
        }
    }

    /// True when no attendee has anything overlapping `[start, end)`.
    pub fn is_free(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !self.meetings.iter().any(|m| m.overlaps(start, end))
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }
}

/// Filter `meetings` down to active ones overlapping `[start, end)`.
pub fn overlapping(
    meetings: Vec<Meeting>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Vec<Meeting> {
    meetings
        .into_iter()
        .filter(|m| m.status.is_active())
        .filter(|m| Some(m.id) != exclude)
        .filter(|m| m.overlaps(start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMeetingStore;
    use tempo_core::types::{MeetingPatch, MeetingStatus, NewMeeting};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn detector_with_ten_o_clock() -> (ConflictDetector, Meeting) {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        let m = store
            .create(
                NewMeeting::new("alice", "Standup", at("2024-06-10T10:00:00Z"), 60)
                    .with_participants(vec!["bob".into()]),
            )
            .await
            .unwrap();
        (ConflictDetector::new(store), m)
    }

    #[tokio::test]
    async fn test_partial_overlap_conflicts() {
        let (detector, m) = detector_with_ten_o_clock().await;
        let found = detector
            .conflicts_for("alice", at("2024-06-10T10:30:00Z"), at("2024-06-10T11:30:00Z"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, m.id);
    }

    #[tokio::test]
    async fn test_touching_interval_does_not_conflict() {
        let (detector, _) = detector_with_ten_o_clock().await;
        let found = detector
            .conflicts_for("alice", at("2024-06-10T11:00:00Z"), at("2024-06-10T12:00:00Z"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_participant_conflicts_too() {
        let (detector, _) = detector_with_ten_o_clock().await;
        let found = detector
            .conflicts_for("bob", at("2024-06-10T09:30:00Z"), at("2024-06-10T10:15:00Z"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_meeting_is_ignored() {
        let (detector, m) = detector_with_ten_o_clock().await;
        detector
            .store()
            .update(
                m.id,
                MeetingPatch {
                    status: Some(MeetingStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let found = detector
            .conflicts_for("alice", at("2024-06-10T10:00:00Z"), at("2024-06-10T11:00:00Z"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_exclusion_and_all_free() {
        let (detector, m) = detector_with_ten_o_clock().await;
        let found = detector
            .conflicts_excluding(
                "alice",
                at("2024-06-10T10:00:00Z"),
                at("2024-06-10T11:00:00Z"),
                m.id,
            )
            .await
            .unwrap();
        assert!(found.is_empty());

        let attendees = vec!["carol".to_string(), "bob".to_string()];
        assert!(!detector
            .all_free(&attendees, at("2024-06-10T10:00:00Z"), at("2024-06-10T10:30:00Z"))
            .await
            .unwrap());
        assert!(detector
            .all_free(&attendees, at("2024-06-10T13:00:00Z"), at("2024-06-10T14:00:00Z"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_dedups_shared_meetings() {
        let (detector, _) = detector_with_ten_o_clock().await;
        let snapshot = detector
            .snapshot(&["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_free(at("2024-06-10T10:59:00Z"), at("2024-06-10T11:30:00Z")));
        assert!(snapshot.is_free(at("2024-06-10T11:00:00Z"), at("2024-06-10T11:30:00Z")));
    }
}
