use async_trait::async_trait;
use rusqlite::{Row, params, params_from_iter};
use serde_json::Value;

use super::Store;
use super::types::{LogEntry, LogKind, NewLogEntry};
use crate::core::error::{ToolError, ToolResult};

/// Append-only log the orchestrator reads drafts and commits back from.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_log(&self, entry: NewLogEntry) -> ToolResult<i64>;
    async fn drafts_by_ids(&self, draft_ids: &[String]) -> ToolResult<Vec<LogEntry>>;
    async fn draft_by_id(&self, draft_id: &str) -> ToolResult<Option<LogEntry>>;
    async fn update_draft_payload(&self, draft_id: &str, payload: &Value) -> ToolResult<()>;
    async fn commits_by_undo_token(&self, undo_token: &str) -> ToolResult<Vec<LogEntry>>;
}

fn parse_json(raw: Option<String>) -> ToolResult<Option<Value>> {
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

type RawLog = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawLog> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn into_entry(raw: RawLog) -> ToolResult<LogEntry> {
    let (id, kind, request_id, draft_id, tool_name, payload, result, undo_token, created_at) = raw;
    let kind = LogKind::from_kind(&kind)
        .ok_or_else(|| ToolError::storage(format!("unknown log kind '{}'", kind)))?;
    Ok(LogEntry {
        id,
        kind,
        request_id,
        draft_id,
        tool_name,
        payload: parse_json(payload)?,
        result: parse_json(result)?,
        undo_token,
        created_at,
    })
}

const LOG_COLUMNS: &str =
    "id, kind, request_id, draft_id, tool_name, payload_json, result_json, undo_token, created_at";

#[async_trait]
impl LogStore for Store {
    async fn insert_log(&self, entry: NewLogEntry) -> ToolResult<i64> {
        let payload_json = serde_json::to_string(&entry.payload)?;
        let result_json = entry.result.as_ref().map(serde_json::to_string).transpose()?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO orchestrator_logs (kind, request_id, draft_id, tool_name, payload_json, result_json, undo_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.kind.as_str(),
                entry.request_id,
                entry.draft_id,
                entry.tool_name,
                payload_json,
                result_json,
                entry.undo_token,
                entry.created_at
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    async fn drafts_by_ids(&self, draft_ids: &[String]) -> ToolResult<Vec<LogEntry>> {
        if draft_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; draft_ids.len()].join(",");
        let sql = format!(
            "SELECT {} FROM orchestrator_logs WHERE kind = 'draft' AND draft_id IN ({}) ORDER BY id ASC",
            LOG_COLUMNS, placeholders
        );
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(draft_ids.iter()), read_raw)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(into_entry(row?)?);
        }
        Ok(entries)
    }

    async fn draft_by_id(&self, draft_id: &str) -> ToolResult<Option<LogEntry>> {
        let sql = format!(
            "SELECT {} FROM orchestrator_logs WHERE kind = 'draft' AND draft_id = ?1 ORDER BY id DESC LIMIT 1",
            LOG_COLUMNS
        );
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let mut rows = stmt.query_map(params![draft_id], read_raw)?;
        match rows.next() {
            Some(row) => Ok(Some(into_entry(row?)?)),
            None => Ok(None),
        }
    }

    async fn update_draft_payload(&self, draft_id: &str, payload: &Value) -> ToolResult<()> {
        let payload_json = serde_json::to_string(payload)?;
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE orchestrator_logs SET payload_json = ?1 WHERE kind = 'draft' AND draft_id = ?2",
            params![payload_json, draft_id],
        )?;
        if changed == 0 {
            return Err(ToolError::not_found("draft not found")
                .with_details(serde_json::json!({ "draft_id": draft_id })));
        }
        Ok(())
    }

    async fn commits_by_undo_token(&self, undo_token: &str) -> ToolResult<Vec<LogEntry>> {
        let sql = format!(
            "SELECT {} FROM orchestrator_logs WHERE kind = 'commit' AND undo_token = ?1 ORDER BY id ASC",
            LOG_COLUMNS
        );
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![undo_token], read_raw)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(into_entry(row?)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;
    use serde_json::json;

    fn draft(draft_id: &str, payload: Value) -> NewLogEntry {
        NewLogEntry {
            kind: LogKind::Draft,
            request_id: Some("req-1".into()),
            draft_id: Some(draft_id.into()),
            tool_name: "create_task".into(),
            payload,
            result: None,
            undo_token: None,
            created_at: "2024-01-10T09:00:00+08:00".into(),
        }
    }

    #[tokio::test]
    async fn drafts_by_ids_skips_unknown_and_commits() {
        let store = test_store();
        store.insert_log(draft("d1", json!({"title": "a"}))).await.unwrap();
        store.insert_log(draft("d2", json!({"title": "b"}))).await.unwrap();
        let mut commit = draft("d1", json!({"title": "a"}));
        commit.kind = LogKind::Commit;
        commit.undo_token = Some("u1".into());
        commit.result = Some(json!({"task_id": 1}));
        store.insert_log(commit).await.unwrap();

        let found = store
            .drafts_by_ids(&["d2".into(), "missing".into(), "d1".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|e| e.kind == LogKind::Draft));

        let commits = store.commits_by_undo_token("u1").await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].result, Some(json!({"task_id": 1})));
        assert!(store.commits_by_undo_token("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_id_list_returns_nothing() {
        let store = test_store();
        assert!(store.drafts_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_payload_round_trips() {
        let store = test_store();
        store.insert_log(draft("d1", json!({"title": "a"}))).await.unwrap();
        store
            .update_draft_payload("d1", &json!({"title": "b"}))
            .await
            .unwrap();
        let entry = store.draft_by_id("d1").await.unwrap().unwrap();
        assert_eq!(entry.payload, Some(json!({"title": "b"})));
        assert_eq!(entry.request_id.as_deref(), Some("req-1"));

        let err = store
            .update_draft_payload("nope", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
