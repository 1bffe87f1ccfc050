use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::types::{EventFilter, EventRecord, NewEvent};
use super::{Store, is_unique_violation, tags_from_json};
use crate::core::error::{ToolError, ToolResult};

const EVENT_COLUMNS: &str =
    "id, type, happened_at, tags_json, data_json, source, confidence, created_at, updated_at, is_deleted";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<(EventRecord, String)> {
    let tags_json: String = row.get(3)?;
    let data_json: String = row.get(4)?;
    Ok((
        EventRecord {
            event_id: row.get(0)?,
            event_type: row.get(1)?,
            happened_at: row.get(2)?,
            tags: tags_from_json(&tags_json),
            data: serde_json::Value::Null,
            source: row.get(5)?,
            confidence: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            is_deleted: row.get(9)?,
        },
        data_json,
    ))
}

fn fetch_one(db: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> ToolResult<Option<EventRecord>> {
    let found = db.query_row(sql, [key], row_to_event).optional()?;
    match found {
        Some((mut event, data_json)) => {
            event.data = serde_json::from_str(&data_json)?;
            Ok(Some(event))
        }
        None => Ok(None),
    }
}

fn event_by_id(db: &Connection, event_id: i64) -> ToolResult<Option<EventRecord>> {
    let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
    fetch_one(db, &sql, &event_id)
}

fn event_by_key(db: &Connection, key: &str) -> ToolResult<Option<EventRecord>> {
    let sql = format!(
        "SELECT {} FROM events WHERE idempotency_key = ?1 LIMIT 1",
        EVENT_COLUMNS
    );
    fetch_one(db, &sql, &key)
}

impl Store {
    /// Insert an event, or return the existing one for a repeated idempotency key.
    pub async fn insert_event(&self, event: NewEvent, now: &str) -> ToolResult<EventRecord> {
        let db = self.db.lock().await;
        if let Some(key) = event.idempotency_key.as_deref()
            && let Some(existing) = event_by_key(&db, key)?
        {
            return Ok(existing);
        }

        let inserted = db.execute(
            "INSERT INTO events (type, data_json, happened_at, tags_json, source, confidence, idempotency_key, is_deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
            params![
                event.event_type,
                serde_json::to_string(&event.data)?,
                event.happened_at,
                serde_json::to_string(&event.tags)?,
                event.source,
                event.confidence,
                event.idempotency_key,
                now
            ],
        );
        let event_id = match inserted {
            Ok(_) => db.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                let key = event.idempotency_key.as_deref().unwrap_or_default();
                return event_by_key(&db, key)?.ok_or_else(|| ToolError::storage(e));
            }
            Err(e) => return Err(e.into()),
        };
        event_by_id(&db, event_id)?
            .ok_or_else(|| ToolError::storage("event vanished after insert"))
    }

    #[cfg(test)]
    pub async fn get_event(&self, event_id: i64) -> ToolResult<Option<EventRecord>> {
        let db = self.db.lock().await;
        event_by_id(&db, event_id)
    }

    pub async fn search_events(&self, filter: &EventFilter) -> ToolResult<Vec<EventRecord>> {
        let mut clauses = vec!["is_deleted = 0".to_string()];
        let mut values: Vec<SqlValue> = Vec::new();
        if !filter.types.is_empty() {
            let marks = vec!["?"; filter.types.len()].join(", ");
            clauses.push(format!("type IN ({})", marks));
            values.extend(filter.types.iter().cloned().map(SqlValue::Text));
        }
        if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            clauses.push("data_json LIKE ?".to_string());
            values.push(SqlValue::Text(format!("%{}%", q)));
        }
        if let Some(from) = &filter.date_from {
            clauses.push("happened_at >= ?".to_string());
            values.push(SqlValue::Text(from.clone()));
        }
        if let Some(to) = &filter.date_to {
            clauses.push("happened_at <= ?".to_string());
            values.push(SqlValue::Text(to.clone()));
        }
        values.push(SqlValue::Integer(filter.limit as i64));
        values.push(SqlValue::Integer(filter.offset as i64));

        let sql = format!(
            "SELECT {} FROM events WHERE {} ORDER BY happened_at DESC LIMIT ? OFFSET ?",
            EVENT_COLUMNS,
            clauses.join(" AND ")
        );
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_event)?;
        let mut items = Vec::new();
        for row in rows {
            let (mut event, data_json) = row?;
            event.data = serde_json::from_str(&data_json)?;
            items.push(event);
        }
        Ok(items)
    }

    pub async fn set_event_deleted(
        &self,
        event_id: i64,
        deleted: bool,
        now: &str,
    ) -> ToolResult<EventRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE events SET is_deleted = ?1, updated_at = ?2 WHERE id = ?3",
            params![deleted as i64, now, event_id],
        )?;
        event_by_id(&db, event_id)?.ok_or_else(|| {
            ToolError::not_found("event not found")
                .with_details(serde_json::json!({ "event_id": event_id }))
        })
    }
}
