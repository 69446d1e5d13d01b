//! In-process meeting store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tempo_core::types::{Meeting, MeetingPatch, MeetingStatus, NewMeeting};

use crate::error::StoreError;
use crate::store::MeetingStore;

/// Meeting store backed by a `Vec` behind a mutex.
///
/// Used for tests and for running without a database file.
pub struct InMemoryMeetingStore {
    meetings: Mutex<Vec<Meeting>>,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self {
            meetings: Mutex::new(Vec::new()),
        }
    }

    /// Pre-populate with existing records.
    pub fn with_meetings(meetings: Vec<Meeting>) -> Self {
        Self {
            meetings: Mutex::new(meetings),
        }
    }

    pub fn len(&self) -> usize {
        self.meetings.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Meeting>>, StoreError> {
        self.meetings
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for InMemoryMeetingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn create(&self, meeting: NewMeeting) -> Result<Meeting, StoreError> {
        let record = meeting.into_meeting(Utc::now());
        self.lock()?.push(record.clone());
        tracing::debug!(meeting_id = %record.id, title = %record.title, "Meeting created");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Meeting>, StoreError> {
        Ok(self.lock()?.iter().find(|m| m.id == id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let meetings = self.lock()?;
        let mut result: Vec<Meeting> = meetings
            .iter()
            .filter(|m| m.involves(user_id))
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(result)
    }

    async fn update(&self, id: Uuid, patch: MeetingPatch) -> Result<Option<Meeting>, StoreError> {
        let mut meetings = self.lock()?;
        let Some(meeting) = meetings.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        patch.apply_to(meeting, Utc::now());
        Ok(Some(meeting.clone()))
    }

    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<Option<Meeting>, StoreError> {
        let mut meetings = self.lock()?;
        let position = meetings
            .iter()
            .position(|m| m.id == id && owner.map_or(true, |o| m.organizer_id == o));
        Ok(position.map(|idx| meetings.remove(idx)))
    }
}
