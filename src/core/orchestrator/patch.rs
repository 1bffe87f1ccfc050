use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::core::constants::AppConstants;
use crate::core::error::{ToolError, ToolResult};
use crate::core::store::types::TaskSnapshot;
use crate::core::time;
use crate::core::tools::default_remind_at;
use crate::core::tools::validate::{normalize_tags, require_enum, require_non_empty_str};

/// Absolute timestamp, or a natural-language phrase the resolver understands.
fn resolve_time(value: &Value, field: &str, tz: Tz) -> ToolResult<String> {
    let Some(raw) = value.as_str() else {
        return Err(ToolError::invalid_time(format!("{} must be a time string", field)));
    };
    match time::ensure_iso8601(raw) {
        Ok(iso) => Ok(iso),
        Err(err) => time::resolve(raw, tz).ok_or(err),
    }
}

fn nullable_time(value: &Value, field: &str, tz: Tz) -> ToolResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        other => resolve_time(other, field, tz).map(Value::String),
    }
}

fn nullable_string(value: &Value, field: &str) -> ToolResult<Value> {
    match value {
        Value::Null | Value::String(_) => Ok(value.clone()),
        _ => Err(ToolError::invalid_param(format!(
            "{} must be string or null",
            field
        ))),
    }
}

fn enum_field(value: &Value, field: &str, allowed: &[String]) -> ToolResult<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| ToolError::invalid_param(format!("{} must be string", field)))?;
    require_enum(raw, field, allowed).map(Value::String)
}

/// Apply a partial edit to a `create_task` draft payload.
pub(super) fn apply_task_patch(
    payload: &Map<String, Value>,
    patch: &Value,
    constants: &AppConstants,
    tz: Tz,
) -> ToolResult<Map<String, Value>> {
    let Some(patch) = patch.as_object() else {
        return Err(ToolError::invalid_param("patch must be object"));
    };
    let mut updated = payload.clone();

    if let Some(title) = patch.get("title") {
        let title = require_non_empty_str(title.as_str(), "title")?;
        updated.insert("title".into(), Value::String(title));
    }
    if let Some(priority) = patch.get("priority") {
        let v = enum_field(priority, "priority", &constants.task.priority)?;
        updated.insert("priority".into(), v);
    }
    if let Some(status) = patch.get("status") {
        let v = enum_field(status, "status", &constants.task.status)?;
        updated.insert("status".into(), v);
    }
    if let Some(due) = patch.get("due_at") {
        updated.insert("due_at".into(), nullable_time(due, "due_at", tz)?);
    }
    if let Some(remind) = patch.get("remind_at") {
        updated.insert("remind_at".into(), nullable_time(remind, "remind_at", tz)?);
    }
    for field in ["note", "project"] {
        if let Some(v) = patch.get(field) {
            updated.insert(field.into(), nullable_string(v, field)?);
        }
    }
    if let Some(tags) = patch.get("tags") {
        let tags = normalize_tags(Some(tags), constants.limits.max_tags)?;
        updated.insert("tags".into(), Value::from(tags));
    }

    if patch.contains_key("due_at")
        && !patch.contains_key("remind_at")
        && updated.get("remind_at").is_none_or(Value::is_null)
        && let Some(due) = updated.get("due_at").and_then(Value::as_str)
    {
        let remind = default_remind_at(due, constants).map_or(Value::Null, Value::String);
        updated.insert("remind_at".into(), remind);
    }

    Ok(updated)
}

fn requested_time(payload: &Map<String, Value>, field: &str, tz: Tz) -> ToolResult<Option<String>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => resolve_time(v, field, tz).map(Some),
    }
}

/// Shift the previous reminder by however far the due time moved.
fn shifted_remind(prev: &TaskSnapshot, new_due: &str) -> Option<String> {
    let prev_due = time::parse_iso8601(prev.due_at.as_deref()?).ok()?;
    let prev_remind = time::parse_iso8601(prev.remind_at.as_deref()?).ok()?;
    let new_due = time::parse_iso8601(new_due).ok()?;
    let shifted = prev_remind.checked_add_signed(new_due - prev_due)?;
    Some(time::format_instant(&shifted))
}

/// New `(due_at, remind_at)` for a postpone. A moved due time keeps the old
/// due-to-remind gap when both were set; a reminder after the due time is
/// replaced with the default offset.
pub(super) fn resolve_postpone_times(
    prev: &TaskSnapshot,
    payload: &Map<String, Value>,
    constants: &AppConstants,
    tz: Tz,
) -> ToolResult<(Option<String>, Option<String>)> {
    let new_due = requested_time(payload, "due_at", tz)?;
    let new_remind = requested_time(payload, "remind_at", tz)?;
    if new_due.is_none() && new_remind.is_none() {
        return Err(ToolError::invalid_param(
            "postpone requires due_at or remind_at",
        ));
    }

    let due = new_due.or_else(|| prev.due_at.clone());
    let mut remind = new_remind.clone();

    if let Some(due) = due.as_deref()
        && new_remind.is_none()
    {
        remind = shifted_remind(prev, due).or_else(|| default_remind_at(due, constants));
    }

    if let (Some(due_str), Some(remind_str)) = (due.as_deref(), remind.as_deref()) {
        let consistent = match (time::parse_iso8601(due_str), time::parse_iso8601(remind_str)) {
            (Ok(d), Ok(r)) => r <= d,
            _ => false,
        };
        if !consistent {
            remind = default_remind_at(due_str, constants);
        }
    }

    Ok((due, remind))
}
