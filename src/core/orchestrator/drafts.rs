use chrono_tz::Tz;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::{DRAFT_STATUS, Draft};
use crate::core::fallback::Proposal;
use crate::core::router::{Card, RouterDecision};
use crate::core::time;
use crate::core::tools::ToolName;

/// Rewrite each time-bearing field to an absolute timestamp. Values that
/// neither parse nor resolve become null; non-strings are left alone.
pub(super) fn normalize_time_fields(tool: ToolName, payload: &mut Map<String, Value>, tz: Tz) {
    for field in tool.time_fields() {
        let Some(Value::String(raw)) = payload.get(*field) else {
            continue;
        };
        let normalized = time::normalize_time_text(raw, tz).map_or(Value::Null, Value::String);
        payload.insert((*field).to_string(), normalized);
    }
}

fn default_card(draft_id: &str, tool: ToolName, payload: &Map<String, Value>) -> Card {
    Card {
        card_id: draft_id.to_string(),
        card_type: tool.card_type().to_string(),
        status: DRAFT_STATUS.to_string(),
        title: String::new(),
        subtitle: String::new(),
        data: payload.clone(),
        actions: Vec::new(),
    }
}

/// The model's card at the same position if it sent one, otherwise a plain
/// card over the payload. Id and status always belong to the draft.
fn pick_card(
    cards: &[Card],
    idx: usize,
    draft_id: &str,
    tool: ToolName,
    payload: &Map<String, Value>,
) -> Card {
    let mut card = cards
        .get(idx)
        .cloned()
        .unwrap_or_else(|| default_card(draft_id, tool, payload));
    card.card_id = draft_id.to_string();
    card.status = DRAFT_STATUS.to_string();
    card
}

fn build_draft(
    tool: ToolName,
    mut payload: Map<String, Value>,
    confidence: f64,
    cards: &[Card],
    idx: usize,
    tz: Tz,
) -> Draft {
    let draft_id = Uuid::new_v4().to_string();
    normalize_time_fields(tool, &mut payload, tz);
    payload.insert(
        "idempotency_key".to_string(),
        Value::String(draft_id.clone()),
    );
    let card = pick_card(cards, idx, &draft_id, tool, &payload);
    Draft {
        draft_id,
        tool_name: tool,
        payload,
        confidence,
        card,
    }
}

pub(super) fn from_decision(decision: &RouterDecision, tz: Tz) -> Vec<Draft> {
    decision
        .tool_calls
        .iter()
        .enumerate()
        .map(|(idx, call)| {
            build_draft(
                call.name,
                call.arguments.clone(),
                decision.confidence,
                &decision.cards,
                idx,
                tz,
            )
        })
        .collect()
}

pub(super) fn from_proposals(proposals: Vec<Proposal>, tz: Tz) -> Vec<Draft> {
    proposals
        .into_iter()
        .map(|p| build_draft(p.tool, p.arguments, p.confidence, &[], 0, tz))
        .collect()
}

/// Card shown for a task draft after a structured edit.
pub(super) fn task_card(draft_id: &str, payload: &Map<String, Value>) -> Card {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let mut parts = Vec::new();
    if let Some(due) = text("due_at") {
        parts.push(format!("截止：{}", due));
    }
    if let Some(remind) = text("remind_at") {
        parts.push(format!("提醒：{}", remind));
    }
    if let Some(priority) = text("priority") {
        parts.push(format!("优先级：{}", priority));
    }
    Card {
        card_id: draft_id.to_string(),
        card_type: "task".to_string(),
        status: DRAFT_STATUS.to_string(),
        title: text("title").unwrap_or("任务").to_string(),
        subtitle: parts.join(" · "),
        data: payload.clone(),
        actions: Vec::new(),
    }
}
