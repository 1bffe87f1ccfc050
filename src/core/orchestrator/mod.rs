mod drafts;
mod patch;
pub mod types;

pub use types::{
    CommitOutcome, Draft, DraftProposal, DraftSummary, EditOutcome, TaskActionOutcome, TaskOp,
    UndoOutcome,
};

use chrono_tz::Tz;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::constants::AppConstants;
use crate::core::error::{ErrorKind, ToolError, ToolResult};
use crate::core::fallback;
use crate::core::router::DecisionRouter;
use crate::core::store::LogStore;
use crate::core::store::types::{LogEntry, LogKind, NewLogEntry};
use crate::core::time;
use crate::core::tools::{DomainTools, ToolInvocation, ToolName};
use types::{CommittedDraft, DRAFT_STATUS, TaskActionResult, Undone};

pub const FALLBACK_CLARIFY_QUESTION: &str = "你想记录什么？";

/// Drives the propose → persist → commit → undo cycle. Holds no state of its
/// own; everything it needs to commit or undo is read back from the log.
pub struct Orchestrator {
    router: Arc<dyn DecisionRouter>,
    logs: Arc<dyn LogStore>,
    tools: Arc<dyn DomainTools>,
    constants: Arc<AppConstants>,
    tz: Tz,
}

impl Orchestrator {
    pub fn new(
        router: Arc<dyn DecisionRouter>,
        logs: Arc<dyn LogStore>,
        tools: Arc<dyn DomainTools>,
        constants: Arc<AppConstants>,
    ) -> Self {
        let tz = constants.timezone();
        Self {
            router,
            logs,
            tools,
            constants,
            tz,
        }
    }

    fn now(&self) -> String {
        time::now_iso8601(self.tz)
    }

    /// Turn free text into drafts. Nothing is persisted.
    pub async fn create_drafts(&self, text: &str) -> ToolResult<DraftProposal> {
        match self.router.route(text).await {
            Ok(decision) if decision.need_clarification => {
                info!("Router asked for clarification (intent={})", decision.intent);
                Ok(DraftProposal::clarify(
                    decision.clarify_question,
                    decision.reply_to_user,
                    decision.cards,
                ))
            }
            Ok(decision) => {
                let drafts = drafts::from_decision(&decision, self.tz);
                Ok(DraftProposal::drafts(drafts, decision.reply_to_user))
            }
            Err(e) if e.kind.is_fallback_eligible() => {
                warn!("Router failed ({}), falling back to heuristics", e);
                let drafts = drafts::from_proposals(fallback::extract(text), self.tz);
                if drafts.is_empty() {
                    return Ok(DraftProposal::clarify(
                        Some(FALLBACK_CLARIFY_QUESTION.to_string()),
                        None,
                        Vec::new(),
                    ));
                }
                info!("Fallback produced {} draft(s)", drafts.len());
                Ok(DraftProposal::drafts(drafts, None))
            }
            Err(e) => Err(e),
        }
    }

    /// Append one draft entry per draft. No domain tool runs here.
    pub async fn save_drafts(
        &self,
        request_id: &str,
        drafts: &[Draft],
    ) -> ToolResult<Vec<DraftSummary>> {
        let created_at = self.now();
        let mut items = Vec::with_capacity(drafts.len());
        for draft in drafts {
            self.logs
                .insert_log(NewLogEntry {
                    kind: LogKind::Draft,
                    request_id: Some(request_id.to_string()),
                    draft_id: Some(draft.draft_id.clone()),
                    tool_name: draft.tool_name.as_str().to_string(),
                    payload: Value::Object(draft.payload.clone()),
                    result: None,
                    undo_token: None,
                    created_at: created_at.clone(),
                })
                .await?;
            items.push(DraftSummary::from(draft));
        }
        info!("Persisted {} draft(s) for request {}", items.len(), request_id);
        Ok(items)
    }

    /// Execute persisted drafts in the order given. A failure midway leaves
    /// earlier commits in place; the caller can undo them with the token
    /// those entries already share.
    pub async fn commit_drafts(&self, draft_ids: &[String]) -> ToolResult<CommitOutcome> {
        let rows = self.logs.drafts_by_ids(draft_ids).await?;
        if rows.is_empty() {
            return Err(ToolError::not_found("no drafts found")
                .with_details(json!({ "draft_ids": draft_ids })));
        }

        let undo_token = Uuid::new_v4().to_string();
        let created_at = self.now();
        let mut committed = Vec::new();

        for row in in_request_order(draft_ids, rows) {
            let tool = parse_tool(row.tool_name.as_deref())?;
            let payload = payload_object(row.payload.as_ref());
            let record = self
                .tools
                .invoke(ToolInvocation::from_payload(tool, &payload)?)
                .await?;
            let result = serde_json::to_value(&record)?;

            self.logs
                .insert_log(NewLogEntry {
                    kind: LogKind::Commit,
                    request_id: row.request_id.clone(),
                    draft_id: row.draft_id.clone(),
                    tool_name: tool.as_str().to_string(),
                    payload: Value::Object(payload),
                    result: Some(result.clone()),
                    undo_token: Some(undo_token.clone()),
                    created_at: created_at.clone(),
                })
                .await?;
            committed.push(CommittedDraft {
                draft_id: row.draft_id.unwrap_or_default(),
                tool_name: tool,
                result,
            });
        }

        info!("Committed {} draft(s) under {}", committed.len(), undo_token);
        Ok(CommitOutcome {
            committed,
            undo_token,
        })
    }

    /// Compensate every commit that shares `undo_token`.
    pub async fn undo(&self, undo_token: &str) -> ToolResult<UndoOutcome> {
        let commits = self.logs.commits_by_undo_token(undo_token).await?;
        if commits.is_empty() {
            return Err(ToolError::not_found("undo_token not found")
                .with_details(json!({ "undo_token": undo_token })));
        }

        let mut undone = Vec::with_capacity(commits.len());
        for row in &commits {
            let tool = parse_tool(row.tool_name.as_deref())?;
            let result = row.result.clone().unwrap_or(Value::Null);
            undone.push(self.compensate(tool, result).await?);
        }

        info!("Undid {} action(s) under {}", undone.len(), undo_token);
        Ok(UndoOutcome {
            undone,
            undo_token: undo_token.to_string(),
        })
    }

    async fn compensate(&self, tool: ToolName, result: Value) -> ToolResult<Undone> {
        match tool {
            ToolName::CreateTask => match positive_id(&result, "task_id") {
                Some(id) => Ok(Undone::Task(Some(self.tools.soft_delete_task(id).await?))),
                None => Ok(Undone::Task(None)),
            },
            ToolName::TaskAction => {
                let action: TaskActionResult = serde_json::from_value(result)?;
                let task = match action.op {
                    TaskOp::Delete => self.tools.restore_task(action.prev.task_id).await?,
                    TaskOp::Complete | TaskOp::Postpone => {
                        self.tools.restore_task_snapshot(&action.prev).await?
                    }
                };
                Ok(Undone::Task(Some(task)))
            }
            _ => match positive_id(&result, "event_id") {
                Some(id) => Ok(Undone::Event(Some(self.tools.soft_delete_event(id).await?))),
                None => Ok(Undone::Event(None)),
            },
        }
    }

    /// Structured edit of a persisted task draft. The draft keeps its id and
    /// request id; only the stored payload changes.
    pub async fn edit_draft(&self, draft_id: &str, patch: &Value) -> ToolResult<EditOutcome> {
        let Some(row) = self.logs.draft_by_id(draft_id).await? else {
            return Err(ToolError::not_found("draft not found")
                .with_details(json!({ "draft_id": draft_id })));
        };
        let tool_name = row.tool_name.clone().unwrap_or_default();
        if ToolName::from_str(&tool_name) != Ok(ToolName::CreateTask) {
            return Err(ToolError::new(
                ErrorKind::UnsupportedEdit,
                "only task drafts support structured edit",
            )
            .with_details(json!({ "tool_name": tool_name })));
        }

        let payload = payload_object(row.payload.as_ref());
        let updated = patch::apply_task_patch(&payload, patch, &self.constants, self.tz)?;
        self.logs
            .update_draft_payload(draft_id, &Value::Object(updated.clone()))
            .await?;
        info!("Edited draft {}", draft_id);

        let card = drafts::task_card(draft_id, &updated);
        Ok(EditOutcome {
            drafts: vec![DraftSummary {
                draft_id: draft_id.to_string(),
                tool_name: ToolName::CreateTask,
                payload: updated,
                confidence: self.constants.defaults.confidence,
                status: DRAFT_STATUS,
            }],
            cards: vec![card],
            request_id: row.request_id,
        })
    }

    /// Complete, postpone or delete an existing task directly, logging the
    /// prior field values under a fresh undo token.
    pub async fn task_action(
        &self,
        task_id: i64,
        op: &str,
        payload: Option<&Value>,
    ) -> ToolResult<TaskActionOutcome> {
        if task_id <= 0 {
            return Err(ToolError::invalid_param("task_id must be positive integer"));
        }
        let Some(op) = TaskOp::from_op(op) else {
            return Err(ToolError::invalid_param(
                "op must be one of complete/postpone/delete",
            ));
        };
        let payload = match payload {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(ToolError::invalid_param("payload must be object")),
        };

        let prev = self.tools.task_snapshot(task_id).await?;
        let task = match op {
            TaskOp::Complete => self.tools.complete_task(task_id).await?,
            TaskOp::Postpone => {
                let (due_at, remind_at) =
                    patch::resolve_postpone_times(&prev, &payload, &self.constants, self.tz)?;
                self.tools.postpone_task(task_id, due_at, remind_at).await?
            }
            TaskOp::Delete => self.tools.soft_delete_task(task_id).await?,
        };

        let undo_token = Uuid::new_v4().to_string();
        let result = serde_json::to_value(TaskActionResult {
            task: task.clone(),
            prev,
            op,
        })?;
        self.logs
            .insert_log(NewLogEntry {
                kind: LogKind::Commit,
                request_id: None,
                draft_id: None,
                tool_name: ToolName::TaskAction.as_str().to_string(),
                payload: json!({ "task_id": task_id, "op": op.as_str(), "payload": payload }),
                result: Some(result),
                undo_token: Some(undo_token.clone()),
                created_at: self.now(),
            })
            .await?;
        info!("Task {} {} (undo {})", task_id, op.as_str(), undo_token);

        Ok(TaskActionOutcome { task, undo_token })
    }
}

/// Reorder fetched draft rows to follow the caller's id list, once each.
fn in_request_order(draft_ids: &[String], rows: Vec<LogEntry>) -> Vec<LogEntry> {
    let mut rows: Vec<Option<LogEntry>> = rows.into_iter().map(Some).collect();
    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(rows.len());
    for id in draft_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        if let Some(slot) = rows
            .iter_mut()
            .find(|r| r.as_ref().and_then(|e| e.draft_id.as_deref()) == Some(id.as_str()))
            && let Some(row) = slot.take()
        {
            ordered.push(row);
        }
    }
    ordered
}

fn parse_tool(name: Option<&str>) -> ToolResult<ToolName> {
    let name = name.unwrap_or_default();
    ToolName::from_str(name).map_err(|_| {
        ToolError::new(ErrorKind::InvalidTool, "unsupported tool")
            .with_details(json!({ "tool_name": name }))
    })
}

fn payload_object(payload: Option<&Value>) -> Map<String, Value> {
    payload
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn positive_id(result: &Value, key: &str) -> Option<i64> {
    result.get(key).and_then(Value::as_i64).filter(|id| *id > 0)
}

#[cfg(test)]
mod tests;
