use chrono::{DateTime, Duration, FixedOffset};
use chrono_tz::Tz;
use tracing::info;

use super::LedgerTools;
use super::args::{TaskArgs, TaskSearchArgs, TaskUpdateArgs};
use super::validate::{normalize_tags, page, require_enum, require_non_empty_str};
use crate::core::constants::AppConstants;
use crate::core::error::{ToolError, ToolResult};
use crate::core::store::types::{NewTask, TaskChanges, TaskFilter, TaskRecord};
use crate::core::time;

/// `due_at` minus the configured offset. `None` when the offset is zero,
/// `due_at` does not parse, or the subtraction leaves chrono's range.
pub fn default_remind_at(due_at: &str, constants: &AppConstants) -> Option<String> {
    let minutes = constants.task.default_remind_offset_minutes;
    if minutes <= 0 {
        return None;
    }
    let due = time::parse_iso8601(due_at).ok()?;
    let remind = due.checked_sub_signed(Duration::try_minutes(minutes)?)?;
    Some(time::format_instant(&remind))
}

/// Which slice of open, dated tasks to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DueWindow {
    Today,
    Overdue,
}

impl DueWindow {
    fn contains(self, due: &DateTime<FixedOffset>, now: &DateTime<FixedOffset>, tz: Tz) -> bool {
        match self {
            Self::Today => due.with_timezone(&tz).date_naive() == now.with_timezone(&tz).date_naive(),
            Self::Overdue => due < now,
        }
    }
}

impl LedgerTools {
    pub(super) async fn create_task(&self, args: TaskArgs) -> ToolResult<TaskRecord> {
        let c = &self.constants;
        let title = require_non_empty_str(args.title.as_deref(), "title")?;
        let priority = require_enum(
            args.priority.as_deref().unwrap_or(c.task.default_priority.as_str()),
            "priority",
            &c.task.priority,
        )?;
        let status = require_enum(
            args.status.as_deref().unwrap_or(c.task.default_status.as_str()),
            "status",
            &c.task.status,
        )?;
        let due_at = args.due_at.as_deref().map(time::ensure_iso8601).transpose()?;
        let mut remind_at = args
            .remind_at
            .as_deref()
            .map(time::ensure_iso8601)
            .transpose()?;
        if remind_at.is_none()
            && let Some(due) = due_at.as_deref()
        {
            remind_at = default_remind_at(due, c);
        }
        let tags = normalize_tags(args.tags.as_ref(), c.limits.max_tags)?;

        let task = self
            .store
            .insert_task(
                NewTask {
                    title,
                    status,
                    priority,
                    due_at,
                    remind_at,
                    project: args.project,
                    tags,
                    note: args.note,
                    idempotency_key: args.idempotency_key,
                },
                &self.now(),
            )
            .await?;
        info!("Recorded task {} ({})", task.task_id, task.title);
        Ok(task)
    }

    pub(super) async fn find_tasks(&self, args: TaskSearchArgs) -> ToolResult<Vec<TaskRecord>> {
        let (limit, offset) = page(args.limit, args.offset)?;
        let status = args
            .status
            .as_deref()
            .map(|s| require_enum(s, "status", &self.constants.task.status))
            .transpose()?;
        let filter = TaskFilter {
            query: args.query,
            status,
            date_from: args.date_from.as_deref().map(time::ensure_iso8601).transpose()?,
            date_to: args.date_to.as_deref().map(time::ensure_iso8601).transpose()?,
            limit,
            offset,
        };
        self.store.search_tasks(&filter).await
    }

    /// Open tasks whose due time falls in `window` as seen from `now` in `tz`.
    /// Rows with an unreadable due time are skipped.
    pub(super) async fn due_tasks_at(
        &self,
        window: DueWindow,
        now: DateTime<FixedOffset>,
        tz: Tz,
    ) -> ToolResult<Vec<TaskRecord>> {
        let tasks = self.store.list_due_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| {
                t.due_at
                    .as_deref()
                    .and_then(|d| time::parse_iso8601(d).ok())
                    .is_some_and(|due| window.contains(&due, &now, tz))
            })
            .collect())
    }

    pub(super) async fn update(&self, task_id: i64, args: TaskUpdateArgs) -> ToolResult<TaskRecord> {
        if task_id <= 0 {
            return Err(ToolError::invalid_param("task_id must be positive integer"));
        }
        let c = &self.constants;
        let changes = TaskChanges {
            title: args
                .title
                .as_deref()
                .map(|t| require_non_empty_str(Some(t), "title"))
                .transpose()?,
            status: args
                .status
                .as_deref()
                .map(|s| require_enum(s, "status", &c.task.status))
                .transpose()?,
            priority: args
                .priority
                .as_deref()
                .map(|p| require_enum(p, "priority", &c.task.priority))
                .transpose()?,
            due_at: args.due_at.as_deref().map(time::ensure_iso8601).transpose()?,
            remind_at: args.remind_at.as_deref().map(time::ensure_iso8601).transpose()?,
            tags: match args.tags.as_ref() {
                None | Some(serde_json::Value::Null) => None,
                tags => Some(normalize_tags(tags, c.limits.max_tags)?),
            },
            project: args.project,
            note: args.note,
        };
        if changes.is_empty() {
            return Err(ToolError::invalid_param("no fields to update"));
        }
        let task = self.store.update_task(task_id, &changes, &self.now()).await?;
        info!("Updated task {}", task.task_id);
        Ok(task)
    }

    pub(super) async fn postpone(
        &self,
        task_id: i64,
        due_at: Option<String>,
        remind_at: Option<String>,
    ) -> ToolResult<TaskRecord> {
        if task_id <= 0 {
            return Err(ToolError::invalid_param("task_id must be positive integer"));
        }
        if due_at.is_none() && remind_at.is_none() {
            return Err(ToolError::invalid_param(
                "new_due_at or new_remind_at required",
            ));
        }
        let due_at = due_at.as_deref().map(time::ensure_iso8601).transpose()?;
        let remind_at = remind_at.as_deref().map(time::ensure_iso8601).transpose()?;
        self.store
            .postpone_task(task_id, due_at.as_deref(), remind_at.as_deref(), &self.now())
            .await
    }
}
