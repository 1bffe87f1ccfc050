use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Draft,
    Commit,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Commit => "commit",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "draft" => Some(Self::Draft),
            "commit" => Some(Self::Commit),
            _ => None,
        }
    }
}

/// Row of the append-only orchestrator log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub kind: LogKind,
    pub request_id: Option<String>,
    pub draft_id: Option<String>,
    pub tool_name: Option<String>,
    pub payload: Option<Value>,
    pub result: Option<Value>,
    pub undo_token: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub kind: LogKind,
    pub request_id: Option<String>,
    pub draft_id: Option<String>,
    pub tool_name: String,
    pub payload: Value,
    pub result: Option<Value>,
    pub undo_token: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub happened_at: String,
    pub tags: Vec<String>,
    pub data: Value,
    pub source: String,
    pub confidence: f64,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i64,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub data: Value,
    pub happened_at: String,
    pub tags: Vec<String>,
    pub source: String,
    pub confidence: f64,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: i64,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub repeat_rule: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub is_deleted: i64,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub status: String,
    pub priority: String,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Validated search over live events, newest first.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub query: Option<String>,
    pub types: Vec<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Validated search over live tasks, earliest due first.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub query: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Fields to overwrite on a task; `None` leaves the column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub tags: Option<Vec<String>>,
    pub project: Option<String>,
    pub note: Option<String>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Mutable task fields captured before a direct task action so undo can put
/// them back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: i64,
    pub status: String,
    pub priority: String,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub project: Option<String>,
    pub note: Option<String>,
    pub tags_json: String,
    pub completed_at: Option<String>,
    pub is_deleted: i64,
    #[serde(default)]
    pub reminded_at: Option<String>,
    #[serde(default)]
    pub notification_id: Option<i64>,
}

/// Task row as the reminder poller needs it.
#[derive(Debug, Clone)]
pub struct PendingReminder {
    pub task_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub remind_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: i64,
    pub task_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub scheduled_at: String,
    pub sent_at: Option<String>,
    pub read_at: Option<String>,
    pub created_at: String,
    pub is_deleted: i64,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub task_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub scheduled_at: String,
    pub sent_at: Option<String>,
}
