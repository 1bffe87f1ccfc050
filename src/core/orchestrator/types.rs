use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::router::Card;
use crate::core::store::types::{EventRecord, TaskRecord, TaskSnapshot};
use crate::core::tools::ToolName;

pub const DRAFT_STATUS: &str = "draft";

/// A proposed tool call awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    pub draft_id: String,
    pub tool_name: ToolName,
    pub payload: Map<String, Value>,
    pub confidence: f64,
    pub card: Card,
}

/// What callers see once a draft has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub draft_id: String,
    pub tool_name: ToolName,
    pub payload: Map<String, Value>,
    pub confidence: f64,
    pub status: &'static str,
}

impl From<&Draft> for DraftSummary {
    fn from(draft: &Draft) -> Self {
        Self {
            draft_id: draft.draft_id.clone(),
            tool_name: draft.tool_name,
            payload: draft.payload.clone(),
            confidence: draft.confidence,
            status: DRAFT_STATUS,
        }
    }
}

/// Result of `create_drafts`: either drafts to persist or a question back to
/// the user. Nothing has been written yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftProposal {
    pub need_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarify_question: Option<String>,
    pub reply_to_user: Option<String>,
    pub drafts: Vec<Draft>,
    pub cards: Vec<Card>,
}

impl DraftProposal {
    pub fn clarify(
        question: Option<String>,
        reply_to_user: Option<String>,
        cards: Vec<Card>,
    ) -> Self {
        Self {
            need_clarification: true,
            clarify_question: question,
            reply_to_user,
            drafts: Vec::new(),
            cards,
        }
    }

    pub fn drafts(drafts: Vec<Draft>, reply_to_user: Option<String>) -> Self {
        let cards = drafts.iter().map(|d| d.card.clone()).collect();
        Self {
            need_clarification: false,
            clarify_question: None,
            reply_to_user,
            drafts,
            cards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedDraft {
    pub draft_id: String,
    pub tool_name: ToolName,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub committed: Vec<CommittedDraft>,
    pub undo_token: String,
}

/// One compensated action. Serializes as `{"event": ...}` or `{"task": ...}`;
/// `None` when the commit result carried no usable id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Undone {
    Event(Option<EventRecord>),
    Task(Option<TaskRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndoOutcome {
    pub undone: Vec<Undone>,
    pub undo_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    pub drafts: Vec<DraftSummary>,
    pub cards: Vec<Card>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOp {
    Complete,
    Postpone,
    Delete,
}

impl TaskOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskOp::Complete => "complete",
            TaskOp::Postpone => "postpone",
            TaskOp::Delete => "delete",
        }
    }

    pub fn from_op(value: &str) -> Option<Self> {
        match value {
            "complete" => Some(TaskOp::Complete),
            "postpone" => Some(TaskOp::Postpone),
            "delete" => Some(TaskOp::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskActionOutcome {
    pub task: TaskRecord,
    pub undo_token: String,
}

/// `result` column of a `task_action` commit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TaskActionResult {
    pub task: TaskRecord,
    pub prev: TaskSnapshot,
    pub op: TaskOp,
}
