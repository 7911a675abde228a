use chrono::{Duration, Utc};
use rusqlite::{OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::{OutboxEvent, QueueCounts, QueueEventStatus};

use super::{SqliteStateStore, usize_to_i64_saturating};

impl SqliteStateStore {
    pub fn enqueue(
        &self,
        event_type: &str,
        uri: &str,
        payload_json: impl serde::Serialize,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let payload_json = serde_json::to_value(payload_json)?.to_string();

        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO outbox(event_type, uri, payload_json, created_at, status, attempt_count, next_attempt_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, ?4)
                ",
                params![
                    event_type,
                    uri,
                    payload_json,
                    now,
                    QueueEventStatus::New.as_str()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Events in `status`, oldest first. `New` events are only returned once due.
    pub fn fetch_outbox(&self, status: QueueEventStatus, limit: usize) -> Result<Vec<OutboxEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, event_type, uri, payload_json, status, attempt_count, next_attempt_at
                FROM outbox
                WHERE status = ?1
                  AND (?1 <> 'new' OR COALESCE(next_attempt_at, created_at) <= ?3)
                ORDER BY id ASC
                LIMIT ?2
                ",
            )?;

            let rows = stmt.query_map(
                params![status.as_str(), usize_to_i64_saturating(limit), now],
                outbox_event_from_row,
            )?;

            let mut events = Vec::new();
            for event in rows {
                events.push(event?);
            }
            Ok(events)
        })
    }

    pub fn get_outbox_event(&self, id: i64) -> Result<Option<OutboxEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, event_type, uri, payload_json, status, attempt_count, next_attempt_at
                FROM outbox
                WHERE id = ?1
                ",
            )?;

            let row = stmt
                .query_row(params![id], outbox_event_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn mark_outbox_status(
        &self,
        id: i64,
        status: QueueEventStatus,
        increment_attempt: bool,
    ) -> Result<()> {
        let status = status.as_str();
        self.with_conn(|conn| {
            if increment_attempt {
                conn.execute(
                    "UPDATE outbox SET status = ?1, attempt_count = attempt_count + 1 WHERE id = ?2",
                    params![status, id],
                )?;
            } else {
                conn.execute(
                    "UPDATE outbox SET status = ?1 WHERE id = ?2",
                    params![status, id],
                )?;
            }
            Ok(())
        })
    }

    pub fn requeue_outbox_with_delay(&self, id: i64, delay_seconds: i64) -> Result<()> {
        let next_attempt = (Utc::now() + Duration::seconds(delay_seconds.max(0))).to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE outbox SET status = 'new', next_attempt_at = ?1 WHERE id = ?2",
                params![next_attempt, id],
            )?;
            Ok(())
        })
    }

    /// Puts events stuck in `processing` (e.g. after a crash) back to `new`.
    pub fn recover_processing_events(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE outbox SET status = 'new' WHERE status = 'processing'",
                [],
            )?;
            Ok(affected)
        })
    }

    #[cfg(test)]
    pub(crate) fn force_outbox_due_now(&self, id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE outbox SET next_attempt_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
    }

    pub fn queue_counts(&self) -> Result<QueueCounts> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let counts = conn.query_row(
                r"
                SELECT
                    COALESCE(SUM(CASE WHEN status = 'new' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'new' AND next_attempt_at <= ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'dead_letter' THEN 1 ELSE 0 END), 0),
                    MIN(CASE WHEN status = 'new' THEN next_attempt_at ELSE NULL END)
                FROM outbox
                ",
                params![now],
                |row| {
                    Ok(QueueCounts {
                        new_total: i64_to_u64_saturating(row.get(0)?),
                        new_due: i64_to_u64_saturating(row.get(1)?),
                        processing: i64_to_u64_saturating(row.get(2)?),
                        done: i64_to_u64_saturating(row.get(3)?),
                        dead_letter: i64_to_u64_saturating(row.get(4)?),
                        earliest_next_attempt_at: row.get(5)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }
}

fn outbox_event_from_row(row: &Row<'_>) -> rusqlite::Result<OutboxEvent> {
    let payload = row.get::<_, String>(3)?;
    let payload_json =
        serde_json::from_str::<serde_json::Value>(&payload).unwrap_or(serde_json::Value::Null);
    Ok(OutboxEvent {
        id: row.get(0)?,
        event_type: row.get(1)?,
        uri: row.get(2)?,
        payload_json,
        status: row.get(4)?,
        attempt_count: i64_to_u32_saturating(row.get::<_, i64>(5)?),
        next_attempt_at: row.get(6)?,
    })
}

fn i64_to_u32_saturating(value: i64) -> u32 {
    if value <= 0 {
        0
    } else {
        u32::try_from(value).unwrap_or(u32::MAX)
    }
}

fn i64_to_u64_saturating(value: i64) -> u64 {
    if value <= 0 {
        0
    } else {
        u64::try_from(value).unwrap_or(u64::MAX)
    }
}
