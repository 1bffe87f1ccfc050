use chrono_tz::Tz;
use serde_json::Value;
use std::str::FromStr;

use crate::core::error::{ErrorKind, ToolError, ToolResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 200;

pub fn require_non_empty_str(value: Option<&str>, field: &str) -> ToolResult<String> {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ToolError::invalid_param(format!(
            "{} must be non-empty string",
            field
        ))),
    }
}

pub fn require_enum(value: &str, field: &str, allowed: &[String]) -> ToolResult<String> {
    if allowed.iter().any(|a| a == value) {
        return Ok(value.to_string());
    }
    let mut sorted: Vec<&str> = allowed.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    Err(ToolError::invalid_param(format!(
        "{} must be one of {:?}",
        field, sorted
    )))
}

pub fn require_positive_number(value: Option<f64>, field: &str) -> ToolResult<f64> {
    match value {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n),
        Some(_) => Err(ToolError::invalid_param(format!("{} must be > 0", field))),
        None => Err(ToolError::invalid_param(format!("{} must be a number", field))),
    }
}

pub fn require_in_range(value: f64, field: &str, min: f64, max: f64) -> ToolResult<f64> {
    if value.is_nan() || value < min || value > max {
        return Err(ToolError::invalid_param(format!(
            "{} must be in range [{}, {}]",
            field, min, max
        )));
    }
    Ok(value)
}

/// Limit and offset for a search, defaulting to the first page.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> ToolResult<(usize, usize)> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ToolError::invalid_param(format!(
            "limit must be in 1..{}",
            MAX_PAGE_SIZE
        )));
    }
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err(ToolError::invalid_param("offset must be >= 0"));
    }
    Ok((limit as usize, offset as usize))
}

/// IANA zone name, or `fallback` when none is given.
pub fn timezone_or(name: Option<&str>, fallback: Tz) -> ToolResult<Tz> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(fallback),
        Some(n) => Tz::from_str(n)
            .map_err(|_| ToolError::invalid_param(format!("unknown timezone {:?}", n))),
    }
}

/// Tags arrive as untyped JSON: absent or null means none, otherwise a list of
/// strings, trimmed, blanks dropped, rejected above `max_tags`.
pub fn normalize_tags(tags: Option<&Value>, max_tags: usize) -> ToolResult<Vec<String>> {
    let items = match tags {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ToolError::new(
                ErrorKind::InvalidTag,
                "Tags must be list of strings",
            ));
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(s) = item.as_str() else {
            return Err(ToolError::new(ErrorKind::InvalidTag, "Tag must be string"));
        };
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }
    if out.len() > max_tags {
        return Err(ToolError::new(
            ErrorKind::TooManyTags,
            format!("Tags size must be <= {}", max_tags),
        )
        .with_details(serde_json::json!({ "count": out.len() })));
    }
    Ok(out)
}
