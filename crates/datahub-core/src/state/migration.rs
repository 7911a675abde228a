use rusqlite::Connection;

use crate::error::{DataHubError, Result};

use super::SqliteStateStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS entities (
        entity_key TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        parent_key TEXT,
        properties_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS serial_alloc (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        allocated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS outbox (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_type TEXT NOT NULL,
        uri TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        attempt_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        next_attempt_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_parent_kind
    ON entities(parent_key, kind, entity_key);
    CREATE INDEX IF NOT EXISTS idx_outbox_status_due
    ON outbox(status, next_attempt_at);
";

impl SqliteStateStore {
    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DataHubError::mutex_poisoned("sqlite"))?;
        conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        ensure_required_column(
            &conn,
            "outbox",
            "next_attempt_at",
            "unsupported outbox schema: next_attempt_at is missing; reset the state database",
        )?;
        ensure_required_column(
            &conn,
            "entities",
            "parent_key",
            "unsupported entities schema: parent_key is missing; reset the state database",
        )?;
        drop(conn);
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(DataHubError::Validation(error_message.to_string()))
    }
}
