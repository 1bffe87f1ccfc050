mod args;
mod events;
mod tasks;
pub mod validate;

pub use args::{EventSearchArgs, TaskSearchArgs, TaskUpdateArgs, ToolInvocation};
pub use tasks::default_remind_at;

use tasks::DueWindow;

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::constants::AppConstants;
use crate::core::error::ToolResult;
use crate::core::store::Store;
use crate::core::store::types::{EventRecord, TaskRecord, TaskSnapshot};
use crate::core::time;

/// The closed set of tool identifiers that take part in draft/commit/undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    CreateExpense,
    CreateLifelog,
    CreateMeal,
    CreateMood,
    CreateTask,
    TaskAction,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateExpense => "create_expense",
            Self::CreateLifelog => "create_lifelog",
            Self::CreateMeal => "create_meal",
            Self::CreateMood => "create_mood",
            Self::CreateTask => "create_task",
            Self::TaskAction => "task_action",
        }
    }

    /// Tools a router decision may propose as a draft.
    pub fn is_draftable(&self) -> bool {
        !matches!(self, Self::TaskAction)
    }

    /// Default card type: the tool name minus its `create_` prefix.
    pub fn card_type(&self) -> &'static str {
        let name = self.as_str();
        name.strip_prefix("create_").unwrap_or(name)
    }

    /// Payload fields carrying a timestamp that drafts normalize.
    pub fn time_fields(&self) -> &'static [&'static str] {
        match self {
            Self::CreateTask => &["due_at", "remind_at"],
            Self::TaskAction => &[],
            _ => &["happened_at"],
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_expense" => Ok(Self::CreateExpense),
            "create_lifelog" => Ok(Self::CreateLifelog),
            "create_meal" => Ok(Self::CreateMeal),
            "create_mood" => Ok(Self::CreateMood),
            "create_task" => Ok(Self::CreateTask),
            "task_action" => Ok(Self::TaskAction),
            _ => Err(()),
        }
    }
}

/// What a create tool returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolRecord {
    Event(EventRecord),
    Task(TaskRecord),
}

/// Domain operations the orchestrator drives. Every method validates its own
/// input and reports violations as typed `ToolError`s.
#[async_trait]
pub trait DomainTools: Send + Sync {
    async fn invoke(&self, call: ToolInvocation) -> ToolResult<ToolRecord>;
    async fn soft_delete_event(&self, event_id: i64) -> ToolResult<EventRecord>;
    async fn complete_task(&self, task_id: i64) -> ToolResult<TaskRecord>;
    async fn postpone_task(
        &self,
        task_id: i64,
        due_at: Option<String>,
        remind_at: Option<String>,
    ) -> ToolResult<TaskRecord>;
    async fn soft_delete_task(&self, task_id: i64) -> ToolResult<TaskRecord>;
    async fn restore_task(&self, task_id: i64) -> ToolResult<TaskRecord>;
    async fn task_snapshot(&self, task_id: i64) -> ToolResult<TaskSnapshot>;
    async fn restore_task_snapshot(&self, snapshot: &TaskSnapshot) -> ToolResult<TaskRecord>;
    async fn search_events(&self, args: EventSearchArgs) -> ToolResult<Vec<EventRecord>>;
    async fn search_tasks(&self, args: TaskSearchArgs) -> ToolResult<Vec<TaskRecord>>;
    /// Open tasks due on today's date in `timezone`, or the configured zone.
    async fn list_tasks_today(&self, timezone: Option<&str>) -> ToolResult<Vec<TaskRecord>>;
    async fn list_tasks_overdue(&self, timezone: Option<&str>) -> ToolResult<Vec<TaskRecord>>;
    async fn update_task(&self, task_id: i64, args: TaskUpdateArgs) -> ToolResult<TaskRecord>;
}

/// SQLite-backed tool set.
pub struct LedgerTools {
    store: Store,
    constants: Arc<AppConstants>,
    tz: Tz,
}

impl LedgerTools {
    pub fn new(store: Store, constants: Arc<AppConstants>) -> Self {
        let tz = constants.timezone();
        Self {
            store,
            constants,
            tz,
        }
    }

    fn now(&self) -> String {
        time::now_iso8601(self.tz)
    }
}

#[async_trait]
impl DomainTools for LedgerTools {
    async fn invoke(&self, call: ToolInvocation) -> ToolResult<ToolRecord> {
        match call {
            ToolInvocation::Expense(args) => self.create_expense(args).await.map(ToolRecord::Event),
            ToolInvocation::Lifelog(args) => self.create_lifelog(args).await.map(ToolRecord::Event),
            ToolInvocation::Meal(args) => self.create_meal(args).await.map(ToolRecord::Event),
            ToolInvocation::Mood(args) => self.create_mood(args).await.map(ToolRecord::Event),
            ToolInvocation::Task(args) => self.create_task(args).await.map(ToolRecord::Task),
        }
    }

    async fn soft_delete_event(&self, event_id: i64) -> ToolResult<EventRecord> {
        validate_id(event_id, "event_id")?;
        self.store.set_event_deleted(event_id, true, &self.now()).await
    }

    async fn complete_task(&self, task_id: i64) -> ToolResult<TaskRecord> {
        validate_id(task_id, "task_id")?;
        self.store.complete_task(task_id, &self.now()).await
    }

    async fn postpone_task(
        &self,
        task_id: i64,
        due_at: Option<String>,
        remind_at: Option<String>,
    ) -> ToolResult<TaskRecord> {
        self.postpone(task_id, due_at, remind_at).await
    }

    async fn soft_delete_task(&self, task_id: i64) -> ToolResult<TaskRecord> {
        validate_id(task_id, "task_id")?;
        self.store.set_task_deleted(task_id, true, &self.now()).await
    }

    async fn restore_task(&self, task_id: i64) -> ToolResult<TaskRecord> {
        validate_id(task_id, "task_id")?;
        self.store.set_task_deleted(task_id, false, &self.now()).await
    }

    async fn task_snapshot(&self, task_id: i64) -> ToolResult<TaskSnapshot> {
        validate_id(task_id, "task_id")?;
        self.store.task_snapshot(task_id).await
    }

    async fn restore_task_snapshot(&self, snapshot: &TaskSnapshot) -> ToolResult<TaskRecord> {
        validate_id(snapshot.task_id, "task_id")?;
        self.store.restore_task_snapshot(snapshot, &self.now()).await
    }

    async fn search_events(&self, args: EventSearchArgs) -> ToolResult<Vec<EventRecord>> {
        self.find_events(args).await
    }

    async fn search_tasks(&self, args: TaskSearchArgs) -> ToolResult<Vec<TaskRecord>> {
        self.find_tasks(args).await
    }

    async fn list_tasks_today(&self, timezone: Option<&str>) -> ToolResult<Vec<TaskRecord>> {
        let tz = validate::timezone_or(timezone, self.tz)?;
        self.due_tasks_at(DueWindow::Today, time::now_in(tz), tz).await
    }

    async fn list_tasks_overdue(&self, timezone: Option<&str>) -> ToolResult<Vec<TaskRecord>> {
        let tz = validate::timezone_or(timezone, self.tz)?;
        self.due_tasks_at(DueWindow::Overdue, time::now_in(tz), tz).await
    }

    async fn update_task(&self, task_id: i64, args: TaskUpdateArgs) -> ToolResult<TaskRecord> {
        self.update(task_id, args).await
    }
}

fn validate_id(id: i64, field: &str) -> ToolResult<()> {
    if id <= 0 {
        return Err(crate::core::error::ToolError::invalid_param(format!(
            "{} must be positive integer",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_tools() -> (Store, LedgerTools) {
    let store = crate::core::store::test_store();
    let tools = LedgerTools::new(store.clone(), Arc::new(AppConstants::default()));
    (store, tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_wire_form() {
        assert_eq!(ToolName::from_str("create_task"), Ok(ToolName::CreateTask));
        assert!(ToolName::from_str("delete_everything").is_err());
        assert_eq!(
            serde_json::to_value(ToolName::CreateMeal).unwrap(),
            serde_json::json!("create_meal")
        );
        assert_eq!(ToolName::CreateExpense.card_type(), "expense");
        assert_eq!(ToolName::TaskAction.card_type(), "task_action");
    }

    #[test]
    fn only_task_action_is_not_draftable() {
        assert!(ToolName::CreateTask.is_draftable());
        assert!(!ToolName::TaskAction.is_draftable());
    }

    #[tokio::test]
    async fn non_positive_ids_are_rejected() {
        let (_, tools) = test_tools();
        assert_eq!(tools.complete_task(0).await.unwrap_err().code(), "invalid_param");
        assert_eq!(tools.soft_delete_event(-1).await.unwrap_err().code(), "invalid_param");
        let err = tools
            .update_task(0, TaskUpdateArgs::default())
            .await
            .unwrap_err();
        assert_eq!(err.message, "task_id must be positive integer");
    }

    #[tokio::test]
    async fn due_lists_reject_unknown_zone() {
        let (_, tools) = test_tools();
        assert!(tools.list_tasks_today(None).await.unwrap().is_empty());
        let err = tools.list_tasks_overdue(Some("Nowhere/City")).await.unwrap_err();
        assert_eq!(err.code(), "invalid_param");
    }
}
