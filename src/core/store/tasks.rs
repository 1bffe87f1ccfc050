use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::types::{NewTask, PendingReminder, TaskChanges, TaskFilter, TaskRecord, TaskSnapshot};
use super::{Store, is_unique_violation, tags_from_json};
use crate::core::error::{ToolError, ToolResult};

const TASK_COLUMNS: &str = "id, title, status, priority, due_at, remind_at, repeat_rule, project, tags_json, note, created_at, updated_at, completed_at, is_deleted";

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let tags_json: String = row.get(8)?;
    Ok(TaskRecord {
        task_id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        priority: row.get(3)?,
        due_at: row.get(4)?,
        remind_at: row.get(5)?,
        repeat_rule: row.get(6)?,
        project: row.get(7)?,
        tags: tags_from_json(&tags_json),
        note: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        completed_at: row.get(12)?,
        is_deleted: row.get(13)?,
    })
}

fn task_by_id(db: &Connection, task_id: i64) -> ToolResult<Option<TaskRecord>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    Ok(db.query_row(&sql, params![task_id], row_to_task).optional()?)
}

fn task_by_key(db: &Connection, key: &str) -> ToolResult<Option<TaskRecord>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE idempotency_key = ?1 LIMIT 1",
        TASK_COLUMNS
    );
    Ok(db.query_row(&sql, params![key], row_to_task).optional()?)
}

fn require_task(db: &Connection, task_id: i64) -> ToolResult<TaskRecord> {
    task_by_id(db, task_id)?.ok_or_else(|| {
        ToolError::not_found("task not found").with_details(serde_json::json!({ "task_id": task_id }))
    })
}

fn query_tasks(db: &Connection, sql: &str, values: &[SqlValue]) -> ToolResult<Vec<TaskRecord>> {
    let mut stmt = db.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

fn text(value: &Option<String>) -> SqlValue {
    match value {
        Some(s) => SqlValue::Text(s.clone()),
        None => SqlValue::Null,
    }
}

impl Store {
    /// Insert a task, or return the existing one for a repeated idempotency key.
    pub async fn insert_task(&self, task: NewTask, now: &str) -> ToolResult<TaskRecord> {
        let db = self.db.lock().await;
        if let Some(key) = task.idempotency_key.as_deref()
            && let Some(existing) = task_by_key(&db, key)?
        {
            return Ok(existing);
        }

        let inserted = db.execute(
            "INSERT INTO tasks (title, status, priority, due_at, remind_at, reminded_at, notification_id, repeat_rule, project, tags_json, note, idempotency_key, is_deleted, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, NULL, ?6, ?7, ?8, ?9, 0, ?10, ?10, NULL)",
            params![
                task.title,
                task.status,
                task.priority,
                task.due_at,
                task.remind_at,
                task.project,
                serde_json::to_string(&task.tags)?,
                task.note,
                task.idempotency_key,
                now
            ],
        );
        match inserted {
            Ok(_) => require_task(&db, db.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => {
                let key = task.idempotency_key.as_deref().unwrap_or_default();
                task_by_key(&db, key)?.ok_or_else(|| ToolError::storage(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(test)]
    pub async fn get_task(&self, task_id: i64) -> ToolResult<Option<TaskRecord>> {
        let db = self.db.lock().await;
        task_by_id(&db, task_id)
    }

    pub async fn search_tasks(&self, filter: &TaskFilter) -> ToolResult<Vec<TaskRecord>> {
        let mut clauses = vec!["is_deleted = 0".to_string()];
        let mut values: Vec<SqlValue> = Vec::new();
        if let Some(status) = &filter.status {
            clauses.push("status = ?".to_string());
            values.push(SqlValue::Text(status.clone()));
        }
        if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            clauses.push("(title LIKE ? OR note LIKE ?)".to_string());
            let pattern = format!("%{}%", q);
            values.push(SqlValue::Text(pattern.clone()));
            values.push(SqlValue::Text(pattern));
        }
        if let Some(from) = &filter.date_from {
            clauses.push("due_at >= ?".to_string());
            values.push(SqlValue::Text(from.clone()));
        }
        if let Some(to) = &filter.date_to {
            clauses.push("due_at <= ?".to_string());
            values.push(SqlValue::Text(to.clone()));
        }
        values.push(SqlValue::Integer(filter.limit as i64));
        values.push(SqlValue::Integer(filter.offset as i64));

        let sql = format!(
            "SELECT {} FROM tasks WHERE {}
             ORDER BY due_at IS NULL, due_at ASC, created_at DESC
             LIMIT ? OFFSET ?",
            TASK_COLUMNS,
            clauses.join(" AND ")
        );
        let db = self.db.lock().await;
        query_tasks(&db, &sql, &values)
    }

    /// Live open tasks that carry a due time, earliest first.
    pub async fn list_due_tasks(&self) -> ToolResult<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE is_deleted = 0
               AND due_at IS NOT NULL
               AND status NOT IN ('done', 'canceled')
             ORDER BY due_at ASC",
            TASK_COLUMNS
        );
        let db = self.db.lock().await;
        query_tasks(&db, &sql, &[])
    }

    /// Overwrite the given fields. A new remind time re-arms the reminder.
    pub async fn update_task(
        &self,
        task_id: i64,
        changes: &TaskChanges,
        now: &str,
    ) -> ToolResult<TaskRecord> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();
        let columns = [
            ("title = ?", &changes.title),
            ("status = ?", &changes.status),
            ("priority = ?", &changes.priority),
            ("due_at = ?", &changes.due_at),
            ("remind_at = ?", &changes.remind_at),
            ("project = ?", &changes.project),
            ("note = ?", &changes.note),
        ];
        for (set, value) in columns {
            if value.is_some() {
                sets.push(set);
                values.push(text(value));
            }
        }
        if let Some(tags) = &changes.tags {
            sets.push("tags_json = ?");
            values.push(SqlValue::Text(serde_json::to_string(tags)?));
        }
        if changes.remind_at.is_some() {
            sets.push("reminded_at = NULL");
            sets.push("notification_id = NULL");
        }
        sets.push("updated_at = ?");
        values.push(SqlValue::Text(now.to_string()));
        values.push(SqlValue::Integer(task_id));

        let db = self.db.lock().await;
        require_task(&db, task_id)?;
        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        db.execute(&sql, params_from_iter(values.iter()))?;
        require_task(&db, task_id)
    }

    pub async fn complete_task(&self, task_id: i64, now: &str) -> ToolResult<TaskRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks SET status = 'done', completed_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, task_id],
        )?;
        require_task(&db, task_id)
    }

    /// Move due and/or remind time. A new remind time re-arms the reminder.
    pub async fn postpone_task(
        &self,
        task_id: i64,
        due_at: Option<&str>,
        remind_at: Option<&str>,
        now: &str,
    ) -> ToolResult<TaskRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks SET
                due_at = COALESCE(?1, due_at),
                remind_at = COALESCE(?2, remind_at),
                reminded_at = CASE WHEN ?2 IS NULL THEN reminded_at ELSE NULL END,
                notification_id = CASE WHEN ?2 IS NULL THEN notification_id ELSE NULL END,
                updated_at = ?3
             WHERE id = ?4",
            params![due_at, remind_at, now, task_id],
        )?;
        require_task(&db, task_id)
    }

    pub async fn set_task_deleted(
        &self,
        task_id: i64,
        deleted: bool,
        now: &str,
    ) -> ToolResult<TaskRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks SET is_deleted = ?1, updated_at = ?2 WHERE id = ?3",
            params![deleted as i64, now, task_id],
        )?;
        require_task(&db, task_id)
    }

    pub async fn task_snapshot(&self, task_id: i64) -> ToolResult<TaskSnapshot> {
        let db = self.db.lock().await;
        db.query_row(
            "SELECT id, status, priority, due_at, remind_at, project, note, tags_json, completed_at, is_deleted, reminded_at, notification_id
             FROM tasks WHERE id = ?1",
            params![task_id],
            |row| {
                Ok(TaskSnapshot {
                    task_id: row.get(0)?,
                    status: row.get(1)?,
                    priority: row.get(2)?,
                    due_at: row.get(3)?,
                    remind_at: row.get(4)?,
                    project: row.get(5)?,
                    note: row.get(6)?,
                    tags_json: row.get(7)?,
                    completed_at: row.get(8)?,
                    is_deleted: row.get(9)?,
                    reminded_at: row.get(10)?,
                    notification_id: row.get(11)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| {
            ToolError::not_found("task not found")
                .with_details(serde_json::json!({ "task_id": task_id }))
        })
    }

    pub async fn restore_task_snapshot(
        &self,
        snapshot: &TaskSnapshot,
        now: &str,
    ) -> ToolResult<TaskRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks SET status = ?1, priority = ?2, due_at = ?3, remind_at = ?4, project = ?5, note = ?6,
                tags_json = ?7, completed_at = ?8, is_deleted = ?9, reminded_at = ?10, notification_id = ?11, updated_at = ?12
             WHERE id = ?13",
            params![
                snapshot.status,
                snapshot.priority,
                snapshot.due_at,
                snapshot.remind_at,
                snapshot.project,
                snapshot.note,
                snapshot.tags_json,
                snapshot.completed_at,
                snapshot.is_deleted,
                snapshot.reminded_at,
                snapshot.notification_id,
                now,
                snapshot.task_id
            ],
        )?;
        require_task(&db, snapshot.task_id)
    }

    /// Armed, undelivered reminders on open tasks, earliest first.
    pub async fn list_pending_reminders(&self, limit: usize) -> ToolResult<Vec<PendingReminder>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, title, note, remind_at FROM tasks
             WHERE is_deleted = 0
               AND remind_at IS NOT NULL
               AND reminded_at IS NULL
               AND status NOT IN ('done', 'canceled')
             ORDER BY remind_at ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PendingReminder {
                task_id: row.get(0)?,
                title: row.get(1)?,
                note: row.get(2)?,
                remind_at: row.get(3)?,
            })
        })?;
        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    pub async fn mark_task_reminded(
        &self,
        task_id: i64,
        notification_id: i64,
        now: &str,
    ) -> ToolResult<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks SET reminded_at = ?1, notification_id = ?2, updated_at = ?1 WHERE id = ?3",
            params![now, notification_id, task_id],
        )?;
        Ok(())
    }
}
