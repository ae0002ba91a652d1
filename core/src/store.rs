//! SQLite-backed durable storage.
//!
//! RULE: Only store.rs talks to the database.
//! Everything else goes through the KeyValueStorage trait.

use crate::{
    error::SurveyResult,
    storage::{KeyValueStorage, FAILED_SUBMISSION_PREFIX},
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub struct LocalStore {
    conn:       Connection,
    /// Written next to every row so entries can be traced to a page visit.
    session_id: String,
}

/// A record that could not be delivered, as found in durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSubmission {
    pub key:        String,
    pub payload:    String,
    pub session_id: String,
    pub written_at: i64,
}

impl LocalStore {
    /// Open (or create) the durable store at `path`.
    pub fn open(path: &str) -> SurveyResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: a crashed writer never corrupts earlier rows.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn, session_id: new_session_id() })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SurveyResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, session_id: new_session_id() })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SurveyResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_storage.sql"))?;
        Ok(())
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ── Failed submissions ─────────────────────────────────────

    pub fn failed_submissions(&self) -> SurveyResult<Vec<FailedSubmission>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, session_id, written_at FROM kv_entry
             WHERE substr(key, 1, ?1) = ?2
             ORDER BY written_at ASC, key ASC",
        )?;
        let rows = stmt
            .query_map(
                params![FAILED_SUBMISSION_PREFIX.len() as i64, FAILED_SUBMISSION_PREFIX],
                |row| {
                    Ok(FailedSubmission {
                        key:        row.get(0)?,
                        payload:    row.get(1)?,
                        session_id: row.get(2)?,
                        written_at: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl KeyValueStorage for LocalStore {
    fn get(&self, key: &str) -> SurveyResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entry WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> SurveyResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entry (key, value, session_id, written_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                session_id = excluded.session_id,
                written_at = excluded.written_at",
            params![key, value, self.session_id, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SurveyResult<()> {
        self.conn
            .execute("DELETE FROM kv_entry WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> SurveyResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv_entry WHERE substr(key, 1, ?1) = ?2 ORDER BY key ASC",
        )?;
        let keys = stmt
            .query_map(params![prefix.len() as i64, prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LocalStore {
        let s = LocalStore::in_memory().expect("in-memory store");
        s.migrate().expect("migration");
        s
    }

    #[test]
    fn set_overwrites_and_get_reads_back() {
        let mut s = store();
        s.set("a", "1").unwrap();
        s.set("a", "2").unwrap();
        assert_eq!(s.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(s.get("missing").unwrap(), None);
    }

    #[test]
    fn failed_submissions_are_listed_with_session() {
        let mut s = store().with_session_id("page-1");
        s.set("surveyData_failed_100", "{\"x\":1}").unwrap();
        s.set("surveyCompleted", "true").unwrap();
        let failed = s.failed_submissions().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "surveyData_failed_100");
        assert_eq!(failed[0].payload, "{\"x\":1}");
        assert_eq!(failed[0].session_id, "page-1");
    }

    #[test]
    fn migrate_is_repeatable() {
        let s = store();
        s.migrate().expect("second migration");
    }
}
