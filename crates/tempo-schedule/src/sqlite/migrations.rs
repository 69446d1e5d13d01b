//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

/// Run all pending migrations. Idempotent.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| StoreError::Query(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Query(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: meetings");
    }

    Ok(())
}

/// Version 1: meetings and their participants.
fn apply_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meetings (
            id                TEXT PRIMARY KEY NOT NULL,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            location          TEXT NOT NULL DEFAULT 'TBD',
            start_time        INTEGER NOT NULL,
            end_time          INTEGER NOT NULL,
            duration_minutes  INTEGER NOT NULL,
            organizer_id      TEXT NOT NULL,
            status            TEXT NOT NULL
                              CHECK (status IN ('proposed', 'confirmed', 'cancelled')),
            meeting_type      TEXT NOT NULL DEFAULT 'meeting',
            constraints       TEXT NOT NULL DEFAULT '{}',
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_meetings_organizer
            ON meetings (organizer_id, start_time DESC);

        CREATE TABLE IF NOT EXISTS meeting_participants (
            meeting_id      TEXT NOT NULL REFERENCES meetings (id) ON DELETE CASCADE,
            participant_id  TEXT NOT NULL,
            position        INTEGER NOT NULL,
            PRIMARY KEY (meeting_id, participant_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON meeting_participants (participant_id);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'meetings');
        ",
    )
    .map_err(|e| StoreError::Query(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO meetings (id, title, start_time, end_time, duration_minutes,
                                   organizer_id, status, created_at, updated_at)
             VALUES ('m1', 'x', 0, 60, 1, 'alice', 'archived', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_participants_cascade_on_delete() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO meetings (id, title, start_time, end_time, duration_minutes,
                                   organizer_id, status, created_at, updated_at)
             VALUES ('m1', 'x', 0, 60, 1, 'alice', 'confirmed', 0, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO meeting_participants (meeting_id, participant_id, position)
             VALUES ('m1', 'bob', 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM meetings WHERE id = 'm1'", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM meeting_participants", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
