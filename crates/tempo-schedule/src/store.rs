//! The meeting persistence contract.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use tempo_core::types::{Meeting, MeetingPatch, MeetingStatus, NewMeeting};

use crate::error::StoreError;

/// Persists and retrieves meeting records.
///
/// Implementations must never panic on backend failure; every failure is a
/// [`StoreError`]. Absent records are `Ok(None)`.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persist a new meeting and return the stored record.
    async fn create(&self, meeting: NewMeeting) -> Result<Meeting, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Meeting>, StoreError>;

    /// Meetings the user organizes or attends, newest start first.
    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<Meeting>, StoreError>;

    /// Apply a patch. Returns `None` if no such meeting exists.
    async fn update(&self, id: Uuid, patch: MeetingPatch) -> Result<Option<Meeting>, StoreError>;

    /// Remove a meeting. With `owner`, only deletes if it matches the organizer.
    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<Option<Meeting>, StoreError>;
}

#[async_trait]
impl MeetingStore for Arc<dyn MeetingStore> {
    async fn create(&self, meeting: NewMeeting) -> Result<Meeting, StoreError> {
        (**self).create(meeting).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Meeting>, StoreError> {
        (**self).get(id).await
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<Meeting>, StoreError> {
        (**self).list_for_user(user_id, status).await
    }

    async fn update(&self, id: Uuid, patch: MeetingPatch) -> Result<Option<Meeting>, StoreError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<Option<Meeting>, StoreError> {
        (**self).delete(id, owner).await
    }
}
