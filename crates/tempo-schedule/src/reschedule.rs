//! Moving existing meetings out of the way of a new one.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use tempo_core::config::{ScheduleConfig, MAX_RESCHEDULE_WINDOW_DAYS};
use tempo_core::time::TimeContext;
use tempo_core::types::{Meeting, MeetingPatch};

use crate::error::StoreError;
use crate::slots::{SlotQuery, SlotSearch};

pub const RESCHEDULE_REASON: &str = "Auto-rescheduled to accommodate new meeting";

/// A meeting that was moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescheduledMeeting {
    pub meeting_id: Uuid,
    pub title: String,
    pub old_start_time: DateTime<Utc>,
    pub new_start_time: DateTime<Utc>,
    pub reason: String,
}

/// A conflicting meeting that could not be moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedConflict {
    pub meeting_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RescheduleReport {
    pub rescheduled: Vec<RescheduledMeeting>,
    pub unresolved: Vec<UnresolvedConflict>,
}

impl RescheduleReport {
    pub fn is_empty(&self) -> bool {
        self.rescheduled.is_empty() && self.unresolved.is_empty()
    }
}

/// Displaces meetings that overlap a newly created one.
#[derive(Clone)]
pub struct AutoRescheduler {
    search: SlotSearch,
    window_start_days: i64,
    window_end_days: i64,
}

impl AutoRescheduler {
    /// Window bounds are clamped to `0..=MAX_RESCHEDULE_WINDOW_DAYS`.
    pub fn new(search: SlotSearch, window_start_days: i64, window_end_days: i64) -> Self {
        let clamp = |days: i64| days.clamp(0, MAX_RESCHEDULE_WINDOW_DAYS);
        Self {
            search,
            window_start_days: clamp(window_start_days),
            window_end_days: clamp(window_end_days),
        }
    }

    pub fn from_config(search: SlotSearch, config: &ScheduleConfig) -> Self {
        Self::new(
            search,
            config.reschedule_window_start_days,
            config.reschedule_window_end_days,
        )
    }

    /// Move every meeting that overlaps `new_meeting` for any of its attendees.
    ///
    /// Each displaced meeting goes to the earliest slot where all of its own
    /// attendees are free, between `new_start + window_start_days` and
    /// `new_start + window_end_days`. Meetings that cannot be moved are
    /// reported as unresolved rather than dropped.
    pub async fn auto_reschedule(
        &self,
        new_meeting: &Meeting,
        tz: &TimeContext,
    ) -> Result<RescheduleReport, StoreError> {
        let detector = self.search.detector();
        let mut conflicts: Vec<Meeting> = Vec::new();
        for attendee in new_meeting.attendees() {
            let found = detector
                .conflicts_excluding(
                    &attendee,
                    new_meeting.start_time,
                    new_meeting.end_time,
                    new_meeting.id,
                )
                .await?;
            for m in found {
                if !conflicts.iter().any(|c| c.id == m.id) {
                    conflicts.push(m);
                }
            }
        }

        let mut report = RescheduleReport::default();
        if conflicts.is_empty() {
            return Ok(report);
        }

        let from = tz.local_date(new_meeting.start_time + Duration::days(self.window_start_days));
        let to = tz.local_date(new_meeting.start_time + Duration::days(self.window_end_days));

        for conflict in conflicts {
            let query = SlotQuery::new(conflict.attendees(), conflict.duration_minutes, from, to)
                .not_before(tz.now());
            let slot = match self.search.earliest(&query, tz).await {
                Ok(slot) => slot,
                Err(e) => {
                    tracing::warn!(meeting_id = %conflict.id, error = %e, "Slot search failed during reschedule");
                    report.unresolved.push(unresolved(&conflict, format!("slot search failed: {}", e)));
                    continue;
                }
            };
            let Some(slot) = slot else {
                report
                    .unresolved
                    .push(unresolved(&conflict, "no free slot in the following week".into()));
                continue;
            };

            let patch = MeetingPatch {
                start_time: Some(slot.start),
                ..Default::default()
            };
            match detector.store().update(conflict.id, patch).await {
                Ok(Some(moved)) => {
                    tracing::info!(
                        meeting_id = %moved.id,
                        old_start = %conflict.start_time,
                        new_start = %moved.start_time,
                        "Meeting auto-rescheduled"
                    );
                    report.rescheduled.push(RescheduledMeeting {
                        meeting_id: moved.id,
                        title: moved.title,
                        old_start_time: conflict.start_time,
                        new_start_time: moved.start_time,
                        reason: RESCHEDULE_REASON.to_string(),
                    });
                }
                Ok(None) => report
                    .unresolved
                    .push(unresolved(&conflict, "meeting no longer exists".into())),
                Err(e) => {
                    tracing::warn!(meeting_id = %conflict.id, error = %e, "Reschedule update failed");
                    report
                        .unresolved
                        .push(unresolved(&conflict, format!("update failed: {}", e)));
                }
            }
        }

        Ok(report)
    }
}

fn unresolved(meeting: &Meeting, reason: String) -> UnresolvedConflict {
    UnresolvedConflict {
        meeting_id: meeting.id,
        title: meeting.title.clone(),
        start_time: meeting.start_time,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::conflict::ConflictDetector;
    use crate::memory::InMemoryMeetingStore;
    use crate::slots::BusinessWindow;
    use crate::store::MeetingStore;
    use tempo_core::types::NewMeeting;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn rescheduler(store: Arc<dyn MeetingStore>) -> AutoRescheduler {
        let search = SlotSearch::new(ConflictDetector::new(store), BusinessWindow::default(), 10);
        AutoRescheduler::new(search, 1, 7)
    }

    #[test]
    fn test_window_is_clamped() {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        let search = SlotSearch::new(ConflictDetector::new(store), BusinessWindow::default(), 10);
        let r = AutoRescheduler::new(search, -5, i64::MAX);
        assert_eq!(r.window_start_days, 0);
        assert_eq!(r.window_end_days, MAX_RESCHEDULE_WINDOW_DAYS);
    }

    #[tokio::test]
    async fn test_no_conflicts_empty_report() {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        let new = store
            .create(NewMeeting::new("alice", "New", at("2024-06-10T10:00:00Z"), 60))
            .await
            .unwrap();
        let tz = TimeContext::utc(at("2024-06-09T00:00:00Z"));
        let report = rescheduler(store).auto_reschedule(&new, &tz).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_moved_into_following_days() {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        let old = store
            .create(
                NewMeeting::new("bob", "Old sync", at("2024-06-10T10:30:00Z"), 30)
                    .with_participants(vec!["alice".into()]),
            )
            .await
            .unwrap();
        let new = store
            .create(NewMeeting::new("alice", "New", at("2024-06-10T10:00:00Z"), 60))
            .await
            .unwrap();
        let tz = TimeContext::utc(at("2024-06-09T00:00:00Z"));

        let report = rescheduler(store.clone()).auto_reschedule(&new, &tz).await.unwrap();
        assert_eq!(report.rescheduled.len(), 1);
        assert!(report.unresolved.is_empty());
        let moved = &report.rescheduled[0];
        assert_eq!(moved.meeting_id, old.id);
        assert_eq!(moved.old_start_time, at("2024-06-10T10:30:00Z"));
        assert_eq!(moved.new_start_time, at("2024-06-11T09:00:00Z"));
        assert_eq!(moved.reason, RESCHEDULE_REASON);

        let reread = store.get(old.id).await.unwrap().unwrap();
        assert_eq!(reread.start_time, at("2024-06-11T09:00:00Z"));
        assert_eq!(reread.end_time, at("2024-06-11T09:30:00Z"));
    }

    #[tokio::test]
    async fn test_conflict_without_free_slot_is_unresolved() {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        // Bob is booked solid for the whole following week.
        store
            .create(NewMeeting::new("bob", "Offsite", at("2024-06-11T00:00:00Z"), 7 * 24 * 60))
            .await
            .unwrap();
        let old = store
            .create(NewMeeting::new("bob", "Old", at("2024-06-10T10:00:00Z"), 30))
            .await
            .unwrap();
        let new = store
            .create(
                NewMeeting::new("alice", "New", at("2024-06-10T10:00:00Z"), 60)
                    .with_participants(vec!["bob".into()]),
            )
            .await
            .unwrap();
        let tz = TimeContext::utc(at("2024-06-09T00:00:00Z"));

        let report = rescheduler(store).auto_reschedule(&new, &tz).await.unwrap();
        assert!(report.rescheduled.is_empty());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].meeting_id, old.id);
    }

    #[tokio::test]
    async fn test_shared_conflict_reported_once() {
        let store: Arc<dyn MeetingStore> = Arc::new(InMemoryMeetingStore::new());
        store
            .create(
                NewMeeting::new("bob", "Shared", at("2024-06-10T10:00:00Z"), 30)
                    .with_participants(vec!["alice".into()]),
            )
            .await
            .unwrap();
        let new = store
            .create(
                NewMeeting::new("alice", "New", at("2024-06-10T10:00:00Z"), 60)
                    .with_participants(vec!["bob".into()]),
            )
            .await
            .unwrap();
        let tz = TimeContext::utc(at("2024-06-09T00:00:00Z"));
        let report = rescheduler(store).auto_reschedule(&new, &tz).await.unwrap();
        assert_eq!(report.rescheduled.len(), 1);
    }
}
