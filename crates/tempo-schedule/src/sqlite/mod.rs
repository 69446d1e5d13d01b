//! SQLite-backed meeting store.
//!
//! Instants are stored as unix seconds. Participants live in their own table
//! so "meetings involving user X" is an indexed lookup.

mod db;
mod migrations;

pub use db::Database;
pub use migrations::run_migrations;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use tempo_core::types::{Meeting, MeetingPatch, MeetingStatus, NewMeeting};

use crate::error::StoreError;
use crate::store::MeetingStore;

const MEETING_COLUMNS: &str = "id, title, description, location, start_time, end_time,
     duration_minutes, organizer_id, status, meeting_type, constraints, created_at, updated_at";

/// Meeting repository over a shared [`Database`].
pub struct SqliteMeetingStore {
    db: Arc<Database>,
}

impl SqliteMeetingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run connection work on the blocking pool; rusqlite calls block.
    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Database task panicked: {}", e)))?
    }
}

/// A meetings row before participants are attached.
struct MeetingRow {
    id: String,
    title: String,
    description: String,
    location: String,
    start_time: i64,
    end_time: i64,
    duration_minutes: i64,
    organizer_id: String,
    status: String,
    meeting_type: String,
    constraints: String,
    created_at: i64,
    updated_at: i64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingRow> {
    Ok(MeetingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        duration_minutes: row.get(6)?,
        organizer_id: row.get(7)?,
        status: row.get(8)?,
        meeting_type: row.get(9)?,
        constraints: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Corrupt(format!("{} out of range: {}", field, secs)))
}

fn load_participants(conn: &Connection, meeting_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT participant_id FROM meeting_participants
         WHERE meeting_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![meeting_id], |row| row.get::<_, String>(0))?;
    let mut participants = Vec::new();
    for row in rows {
        participants.push(row?);
    }
    Ok(participants)
}

fn hydrate(conn: &Connection, row: MeetingRow) -> Result<Meeting, StoreError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| StoreError::Corrupt(format!("meeting id {}: {}", row.id, e)))?;
    let status: MeetingStatus = row
        .status
        .parse()
        .map_err(|e: tempo_core::TempoError| StoreError::Corrupt(e.to_string()))?;
    let constraints: BTreeMap<String, String> = serde_json::from_str(&row.constraints)
        .map_err(|e| StoreError::Corrupt(format!("constraints for {}: {}", row.id, e)))?;
    let duration_minutes = u32::try_from(row.duration_minutes)
        .map_err(|_| StoreError::Corrupt(format!("negative duration for {}", row.id)))?;

    Ok(Meeting {
        id,
        participants: load_participants(conn, &row.id)?,
        title: row.title,
        description: row.description,
        location: row.location,
        start_time: timestamp(row.start_time, "start_time")?,
        end_time: timestamp(row.end_time, "end_time")?,
        duration_minutes,
        organizer_id: row.organizer_id,
        status,
        meeting_type: row.meeting_type,
        constraints,
        created_at: timestamp(row.created_at, "created_at")?,
        updated_at: timestamp(row.updated_at, "updated_at")?,
    })
}

fn find(conn: &Connection, id: Uuid) -> Result<Option<Meeting>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM meetings WHERE id = ?1", MEETING_COLUMNS),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(|r| hydrate(conn, r)).transpose()
}

fn write_participants(
    conn: &Connection,
    meeting_id: &str,
    participants: &[String],
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM meeting_participants WHERE meeting_id = ?1",
        params![meeting_id],
    )?;
    for (position, participant) in participants.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO meeting_participants (meeting_id, participant_id, position)
             VALUES (?1, ?2, ?3)",
            params![meeting_id, participant, position as i64],
        )?;
    }
    Ok(())
}

fn write_meeting(conn: &Connection, meeting: &Meeting, insert: bool) -> Result<(), StoreError> {
    let constraints = serde_json::to_string(&meeting.constraints)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let sql = if insert {
        "INSERT INTO meetings (id, title, description, location, start_time, end_time,
             duration_minutes, organizer_id, status, meeting_type, constraints, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    } else {
        "UPDATE meetings SET title = ?2, description = ?3, location = ?4, start_time = ?5,
             end_time = ?6, duration_minutes = ?7, organizer_id = ?8, status = ?9,
             meeting_type = ?10, constraints = ?11, created_at = ?12, updated_at = ?13
         WHERE id = ?1"
    };
    conn.execute(
        sql,
        params![
            meeting.id.to_string(),
            meeting.title,
            meeting.description,
            meeting.location,
            meeting.start_time.timestamp(),
            meeting.end_time.timestamp(),
            i64::from(meeting.duration_minutes),
            meeting.organizer_id,
            meeting.status.as_str(),
            meeting.meeting_type,
            constraints,
            meeting.created_at.timestamp(),
            meeting.updated_at.timestamp(),
        ],
    )?;
    Ok(())
}

/// Drop sub-second precision so what we return equals what a later read sees.
fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

#[async_trait]
impl MeetingStore for SqliteMeetingStore {
    async fn create(&self, meeting: NewMeeting) -> Result<Meeting, StoreError> {
        let mut record = meeting.into_meeting(truncate_to_seconds(Utc::now()));
        record.start_time = truncate_to_seconds(record.start_time);
        record.end_time = truncate_to_seconds(record.end_time);

        let record = self
            .run(move |conn| {
                let tx = conn.unchecked_transaction()?;
                write_meeting(&tx, &record, true)?;
                write_participants(&tx, &record.id.to_string(), &record.participants)?;
                tx.commit()?;
                Ok(record)
            })
            .await?;
        tracing::debug!(meeting_id = %record.id, title = %record.title, "Meeting stored");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Meeting>, StoreError> {
        self.run(move |conn| find(conn, id)).await
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM meetings
                 WHERE (organizer_id = ?1
                        OR id IN (SELECT meeting_id FROM meeting_participants
                                  WHERE participant_id = ?1))
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY start_time DESC",
                MEETING_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id, status.map(|s| s.as_str())], map_row)?;
            let mut raw = Vec::new();
            for row in rows {
                raw.push(row?);
            }
            raw.into_iter().map(|r| hydrate(conn, r)).collect()
        })
        .await
    }

    async fn update(&self, id: Uuid, patch: MeetingPatch) -> Result<Option<Meeting>, StoreError> {
        self.run(move |conn| {
            let Some(mut meeting) = find(conn, id)? else {
                return Ok(None);
            };
            patch.apply_to(&mut meeting, truncate_to_seconds(Utc::now()));
            meeting.start_time = truncate_to_seconds(meeting.start_time);
            meeting.end_time = truncate_to_seconds(meeting.end_time);

            let tx = conn.unchecked_transaction()?;
            write_meeting(&tx, &meeting, false)?;
            if patch.participants.is_some() {
                write_participants(&tx, &meeting.id.to_string(), &meeting.participants)?;
            }
            tx.commit()?;
            Ok(Some(meeting))
        })
        .await
    }

    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<Option<Meeting>, StoreError> {
        let owner = owner.map(str::to_string);
        self.run(move |conn| {
            let Some(meeting) = find(conn, id)? else {
                return Ok(None);
            };
            if owner.as_deref().is_some_and(|o| o != meeting.organizer_id) {
                return Ok(None);
            }
            conn.execute("DELETE FROM meetings WHERE id = ?1", params![id.to_string()])?;
            Ok(Some(meeting))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn store() -> SqliteMeetingStore {
        SqliteMeetingStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_create_then_read_back() {
        let store = store();
        let start = at("2024-06-10T10:00:00Z");
        let created = store
            .create(
                NewMeeting::new("alice", "Design review", start, 90)
                    .with_participants(vec!["bob".into(), "carol".into()]),
            )
            .await
            .unwrap();

        let listed = store.list_for_user("alice", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].end_time, start + Duration::minutes(90));
        assert_eq!(listed[0].participants, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_participant_sees_meeting() {
        let store = store();
        store
            .create(
                NewMeeting::new("alice", "Sync", at("2024-06-10T10:00:00Z"), 30)
                    .with_participants(vec!["bob".into()]),
            )
            .await
            .unwrap();
        assert_eq!(store.list_for_user("bob", None).await.unwrap().len(), 1);
        assert!(store.list_for_user("dave", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_order_and_status_filter() {
        let store = store();
        let first = store
            .create(NewMeeting::new("alice", "A", at("2024-06-10T09:00:00Z"), 30))
            .await
            .unwrap();
        store
            .create(NewMeeting::new("alice", "B", at("2024-06-11T09:00:00Z"), 30))
            .await
            .unwrap();
        store
            .update(
                first.id,
                MeetingPatch {
                    status: Some(MeetingStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let all: Vec<String> = store
            .list_for_user("alice", None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(all, vec!["B", "A"]);

        let confirmed = store
            .list_for_user("alice", Some(MeetingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].title, "B");
    }

    #[tokio::test]
    async fn test_update_recomputes_end_and_replaces_participants() {
        let store = store();
        let m = store
            .create(
                NewMeeting::new("alice", "Sync", at("2024-06-10T10:00:00Z"), 30)
                    .with_participants(vec!["bob".into()]),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                m.id,
                MeetingPatch {
                    start_time: Some(at("2024-06-10T15:00:00Z")),
                    participants: Some(vec!["carol".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.end_time, at("2024-06-10T15:30:00Z"));

        let reread = store.get(m.id).await.unwrap().unwrap();
        assert_eq!(reread.participants, vec!["carol"]);
        assert!(store.list_for_user("bob", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = store();
        let id = Uuid::new_v4();
        assert!(store.update(id, MeetingPatch::default()).await.unwrap().is_none());
        assert!(store.delete(id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_owner_check() {
        let store = store();
        let m = store
            .create(NewMeeting::new("alice", "Sync", at("2024-06-10T10:00:00Z"), 30))
            .await
            .unwrap();
        assert!(store.delete(m.id, Some("mallory")).await.unwrap().is_none());
        let deleted = store.delete(m.id, Some("alice")).await.unwrap().unwrap();
        assert_eq!(deleted.id, m.id);
        assert!(store.get(m.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writers_share_connection() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let title = format!("Sync {}", i);
                store
                    .create(NewMeeting::new("alice", title, at("2024-06-10T10:00:00Z"), 30))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list_for_user("alice", None).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempo.db");
        let id = {
            let store = SqliteMeetingStore::new(Arc::new(Database::new(&path).unwrap()));
            store
                .create(NewMeeting::new("alice", "Retro", at("2024-06-14T16:00:00Z"), 60))
                .await
                .unwrap()
                .id
        };
        let store = SqliteMeetingStore::new(Arc::new(Database::new(&path).unwrap()));
        let m = store.get(id).await.unwrap().unwrap();
        assert_eq!(m.title, "Retro");
    }
}
