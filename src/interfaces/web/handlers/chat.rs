use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::core::error::{ErrorKind, ToolError, ToolResult};
use crate::interfaces::web::AppState;

/// Loose truthiness for optional mode fields: absent, null, false, zero,
/// empty strings and empty containers all count as "not given".
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn non_empty_str<'a>(body: &'a Map<String, Value>, field: &str) -> ToolResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::invalid_param(format!("{} must be non-empty string", field)))
}

async fn dispatch(state: &AppState, body: &Map<String, Value>) -> ToolResult<Value> {
    let orchestrator = &state.orchestrator;
    let action = body.get("action").and_then(Value::as_str);

    if action == Some("edit") {
        let draft_id = non_empty_str(body, "draft_id")?;
        let patch = match body.get("patch") {
            None | Some(Value::Null) => return Err(ToolError::invalid_param("patch is required")),
            Some(p) => p,
        };
        return Ok(serde_json::to_value(orchestrator.edit_draft(draft_id, patch).await?)?);
    }

    if action == Some("task_action") {
        let task_id = body
            .get("task_id")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or_else(|| ToolError::invalid_param("task_id must be positive integer"))?;
        let op = non_empty_str(body, "op")?;
        let payload = body.get("payload");
        if !matches!(payload, None | Some(Value::Null) | Some(Value::Object(_))) {
            return Err(ToolError::invalid_param("payload must be object"));
        }
        let outcome = orchestrator.task_action(task_id, op, payload).await?;
        return Ok(serde_json::to_value(outcome)?);
    }

    if truthy(body.get("undo_token")) {
        let Some(token) = body.get("undo_token").and_then(Value::as_str) else {
            return Err(ToolError::invalid_param("undo_token must be string"));
        };
        return Ok(serde_json::to_value(orchestrator.undo(token).await?)?);
    }

    if truthy(body.get("confirm_draft_ids")) {
        let Some(items) = body.get("confirm_draft_ids").and_then(Value::as_array) else {
            return Err(ToolError::invalid_param("confirm_draft_ids must be list"));
        };
        let ids = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(|| ToolError::invalid_param("confirm_draft_ids must be list of strings"))?;
        return Ok(serde_json::to_value(orchestrator.commit_drafts(&ids).await?)?);
    }

    let text = non_empty_str(body, "text")?;
    let request_id = body
        .get("request_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let proposal = orchestrator.create_drafts(text).await?;
    if proposal.need_clarification {
        return Ok(serde_json::to_value(proposal)?);
    }
    let items = orchestrator.save_drafts(&request_id, &proposal.drafts).await?;
    Ok(json!({
        "drafts": items,
        "cards": proposal.cards,
        "request_id": request_id,
        "reply_to_user": proposal.reply_to_user,
    }))
}

pub async fn chat_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Ok(Json(body)) = payload else {
        return Err(ApiError(ToolError::new(
            ErrorKind::InvalidJson,
            "Request body must be JSON",
        )));
    };
    let Value::Object(body) = body else {
        return Err(ToolError::invalid_param("Request body must be a JSON object").into());
    };
    debug!("POST /chat with fields {:?}", body.keys().collect::<Vec<_>>());
    Ok(Json(dispatch(&state, &body).await?))
}
