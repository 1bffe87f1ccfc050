use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::core::error::ToolResult;
use crate::core::store::Store;
use crate::core::store::types::NewNotification;
use crate::core::time;

pub const REMINDER_TITLE: &str = "Task Reminder";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderReport {
    pub checked: usize,
    pub triggered: usize,
    pub skipped: usize,
    pub notification_ids: Vec<i64>,
    pub task_ids: Vec<i64>,
}

/// Turns due task reminders into notifications. One pass per tick; a task is
/// reminded at most once until its remind time is moved again.
pub struct ReminderScheduler {
    store: Store,
    tz: Tz,
    poll_limit: usize,
}

impl ReminderScheduler {
    pub fn new(store: Store, tz: Tz, poll_limit: usize) -> Self {
        Self {
            store,
            tz,
            poll_limit,
        }
    }

    pub async fn run_once(&self, now: DateTime<FixedOffset>) -> ToolResult<ReminderReport> {
        let now_iso = time::format_instant(&now);
        let pending = self.store.list_pending_reminders(self.poll_limit).await?;
        let mut report = ReminderReport {
            checked: pending.len(),
            ..Default::default()
        };

        for task in pending {
            let Some(remind_at) = task.remind_at.filter(|s| !s.is_empty()) else {
                report.skipped += 1;
                continue;
            };
            let due = match time::parse_iso8601(&remind_at) {
                Ok(dt) => dt,
                Err(e) => {
                    warn!("Skipping reminder for task {}: {}", task.task_id, e);
                    report.skipped += 1;
                    continue;
                }
            };
            if due > now {
                continue;
            }

            let notification = self
                .store
                .insert_notification(
                    NewNotification {
                        task_id: Some(task.task_id),
                        title: REMINDER_TITLE.to_string(),
                        content: Some(task.note.unwrap_or(task.title)),
                        scheduled_at: remind_at,
                        sent_at: Some(now_iso.clone()),
                    },
                    &now_iso,
                )
                .await?;
            self.store
                .mark_task_reminded(task.task_id, notification.notification_id, &now_iso)
                .await?;
            report.notification_ids.push(notification.notification_id);
            report.task_ids.push(task.task_id);
        }

        report.triggered = report.notification_ids.len();
        Ok(report)
    }

    pub async fn tick(&self) -> ToolResult<ReminderReport> {
        let report = self.run_once(time::now_in(self.tz)).await?;
        if report.triggered > 0 {
            info!(
                "Triggered {} reminder(s) (tasks={:?}, notifications={:?})",
                report.triggered, report.task_ids, report.notification_ids
            );
        } else {
            debug!("Reminder tick: {} checked, none due", report.checked);
        }
        Ok(report)
    }

    /// Register a repeating tick and start the scheduler. The returned handle
    /// must be kept alive for the job to keep firing.
    pub async fn spawn(self: Arc<Self>, every: Duration) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let job = Job::new_repeated_async(every, move |_uuid, _lock| {
            let reminders = self.clone();
            Box::pin(async move {
                if let Err(e) = reminders.tick().await {
                    error!("Reminder tick failed: {}", e);
                }
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!("Reminder scheduler started (every {}s)", every.as_secs());
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;
    use crate::core::store::types::NewTask;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    async fn task(store: &Store, title: &str, remind_at: Option<&str>, note: Option<&str>) -> i64 {
        store
            .insert_task(
                NewTask {
                    title: title.into(),
                    status: "todo".into(),
                    priority: "medium".into(),
                    due_at: None,
                    remind_at: remind_at.map(str::to_string),
                    project: None,
                    tags: vec![],
                    note: note.map(str::to_string),
                    idempotency_key: None,
                },
                "2024-01-10T08:00:00+08:00",
            )
            .await
            .unwrap()
            .task_id
    }

    #[tokio::test]
    async fn due_reminders_fire_once() {
        let store = test_store();
        let due = task(&store, "交报告", Some("2024-01-10T09:00:00+08:00"), Some("季度报告")).await;
        let later = task(&store, "开会", Some("2024-01-10T11:00:00+08:00"), None).await;
        task(&store, "坏数据", Some("soon"), None).await;

        let scheduler = ReminderScheduler::new(store.clone(), chrono_tz::Asia::Shanghai, 200);
        let now = at("2024-01-10T10:00:00+08:00");
        let report = scheduler.run_once(now).await.unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.triggered, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.task_ids, vec![due]);

        let notes = store.list_notifications(true, 10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, REMINDER_TITLE);
        assert_eq!(notes[0].content.as_deref(), Some("季度报告"));
        assert_eq!(notes[0].scheduled_at, "2024-01-10T09:00:00+08:00");
        assert_eq!(notes[0].sent_at.as_deref(), Some("2024-01-10T10:00:00+08:00"));

        let again = scheduler.run_once(now).await.unwrap();
        assert_eq!(again.triggered, 0);
        assert_eq!(again.checked, 2);

        let report = scheduler
            .run_once(at("2024-01-10T12:00:00+08:00"))
            .await
            .unwrap();
        assert_eq!(report.task_ids, vec![later]);
    }

    #[tokio::test]
    async fn poll_limit_bounds_the_batch() {
        let store = test_store();
        for i in 0..3 {
            task(&store, &format!("t{}", i), Some("2024-01-10T09:00:00+08:00"), None).await;
        }
        let scheduler = ReminderScheduler::new(store, chrono_tz::Asia::Shanghai, 2);
        let report = scheduler
            .run_once(at("2024-01-10T10:00:00+08:00"))
            .await
            .unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.triggered, 2);
    }

    #[tokio::test]
    async fn completed_tasks_are_ignored() {
        let store = test_store();
        let id = task(&store, "done already", Some("2024-01-10T09:00:00+08:00"), None).await;
        store.complete_task(id, "2024-01-10T09:30:00+08:00").await.unwrap();
        let scheduler = ReminderScheduler::new(store, chrono_tz::Asia::Shanghai, 200);
        let report = scheduler
            .run_once(at("2024-01-10T10:00:00+08:00"))
            .await
            .unwrap();
        assert_eq!(report, ReminderReport::default());
    }
}
