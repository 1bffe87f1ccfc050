use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::types::{NewNotification, NotificationRecord};
use crate::core::error::{ToolError, ToolResult};

const NOTIFICATION_COLUMNS: &str =
    "id, task_id, title, content, scheduled_at, sent_at, read_at, created_at, is_deleted";

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        notification_id: row.get(0)?,
        task_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        scheduled_at: row.get(4)?,
        sent_at: row.get(5)?,
        read_at: row.get(6)?,
        created_at: row.get(7)?,
        is_deleted: row.get(8)?,
    })
}

fn notification_by_id(db: &Connection, id: i64) -> ToolResult<Option<NotificationRecord>> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE id = ?1",
        NOTIFICATION_COLUMNS
    );
    Ok(db.query_row(&sql, params![id], row_to_notification).optional()?)
}

impl Store {
    pub async fn insert_notification(
        &self,
        notification: NewNotification,
        now: &str,
    ) -> ToolResult<NotificationRecord> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO notifications (task_id, title, content, scheduled_at, sent_at, read_at, is_deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0, ?6)",
            params![
                notification.task_id,
                notification.title,
                notification.content,
                notification.scheduled_at,
                notification.sent_at,
                now
            ],
        )?;
        notification_by_id(&db, db.last_insert_rowid())?
            .ok_or_else(|| ToolError::storage("notification vanished after insert"))
    }

    pub async fn list_notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> ToolResult<Vec<NotificationRecord>> {
        let mut sql = format!(
            "SELECT {} FROM notifications WHERE is_deleted = 0",
            NOTIFICATION_COLUMNS
        );
        if unread_only {
            sql.push_str(" AND read_at IS NULL");
        }
        sql.push_str(" ORDER BY scheduled_at ASC LIMIT ?1");

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], row_to_notification)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        now: &str,
    ) -> ToolResult<NotificationRecord> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE notifications SET read_at = ?1 WHERE id = ?2",
            params![now, notification_id],
        )?;
        notification_by_id(&db, notification_id)?.ok_or_else(|| {
            ToolError::not_found("notification not found")
                .with_details(serde_json::json!({ "notification_id": notification_id }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;

    fn reminder(scheduled_at: &str) -> NewNotification {
        NewNotification {
            task_id: Some(1),
            title: "Task Reminder".into(),
            content: Some("call mom".into()),
            scheduled_at: scheduled_at.into(),
            sent_at: Some(scheduled_at.into()),
        }
    }

    #[tokio::test]
    async fn list_orders_by_schedule_and_filters_read() {
        let store = test_store();
        let now = "2024-01-10T09:00:00+08:00";
        let late = store
            .insert_notification(reminder("2024-01-10T12:00:00+08:00"), now)
            .await
            .unwrap();
        let early = store
            .insert_notification(reminder("2024-01-10T08:00:00+08:00"), now)
            .await
            .unwrap();

        let all = store.list_notifications(true, 20).await.unwrap();
        assert_eq!(all[0].notification_id, early.notification_id);
        assert_eq!(all[1].notification_id, late.notification_id);

        let read = store
            .mark_notification_read(early.notification_id, now)
            .await
            .unwrap();
        assert_eq!(read.read_at.as_deref(), Some(now));

        let unread = store.list_notifications(true, 20).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(store.list_notifications(false, 20).await.unwrap().len(), 2);
        assert_eq!(store.list_notifications(false, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_missing_is_not_found() {
        let store = test_store();
        let err = store
            .mark_notification_read(3, "2024-01-10T09:00:00+08:00")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
