use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use crate::document::{Entity, Property};
use crate::error::{DataHubError, Result};
use crate::keyed::KeyedStore;
use crate::path::{ACL_KIND, Key};

use super::{SqliteStateStore, usize_to_i64_saturating};

impl KeyedStore for SqliteStateStore {
    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        let encoded = key.encode()?;
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT entity_key, properties_json FROM entities WHERE entity_key = ?1",
                    params![encoded],
                    entity_columns,
                )
                .optional()?;
            row.map(|(key, properties)| entity_from_columns(&key, &properties))
                .transpose()
        })
    }

    fn put(&self, entity: Entity) -> Result<Key> {
        let Entity { key, properties } = entity;
        let properties_json = serde_json::to_string(&properties)?;
        let now = Utc::now().to_rfc3339();
        self.with_tx(|tx| {
            let key = if key.is_complete() {
                key
            } else {
                tx.execute(
                    "INSERT INTO serial_alloc(allocated_at) VALUES (?1)",
                    params![now],
                )?;
                let serial = u64::try_from(tx.last_insert_rowid()).map_err(|_| {
                    DataHubError::Internal("serial allocator returned a negative id".to_string())
                })?;
                key.with_serial(serial)
            };
            let parent_key = key.parent().map(|parent| parent.encode()).transpose()?;
            tx.execute(
                r"
                INSERT INTO entities(entity_key, kind, parent_key, properties_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(entity_key) DO UPDATE SET
                  properties_json = excluded.properties_json,
                  updated_at = excluded.updated_at
                ",
                params![key.encode()?, key.kind(), parent_key, properties_json, now],
            )?;
            Ok(key)
        })
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        let encoded = keys.iter().map(Key::encode).collect::<Result<Vec<_>>>()?;
        self.with_tx(|tx| {
            for key in &encoded {
                tx.execute("DELETE FROM entities WHERE entity_key = ?1", params![key])?;
            }
            Ok(())
        })
    }

    fn query_children(&self, parent: &Key, offset: usize, limit: usize) -> Result<Vec<Entity>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let parent = parent.encode()?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT entity_key, properties_json
                FROM entities
                WHERE parent_key = ?1 AND kind <> ?2
                ORDER BY entity_key ASC
                LIMIT ?3 OFFSET ?4
                ",
            )?;
            let rows = stmt.query_map(
                params![
                    parent,
                    ACL_KIND,
                    usize_to_i64_saturating(limit),
                    usize_to_i64_saturating(offset)
                ],
                entity_columns,
            )?;

            let mut out = Vec::new();
            for row in rows {
                let (key, properties) = row?;
                out.push(entity_from_columns(&key, &properties)?);
            }
            Ok(out)
        })
    }
}

fn entity_columns(row: &Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn entity_from_columns(key: &str, properties_json: &str) -> Result<Entity> {
    let properties = serde_json::from_str::<BTreeMap<String, Property>>(properties_json)?;
    Ok(Entity::with_properties(Key::decode(key)?, properties))
}
