mod natural;

pub use natural::resolve;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::core::error::{ToolError, ToolResult};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn format_instant(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub fn now_in(tz: Tz) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&tz).fixed_offset()
}

pub fn now_iso8601(tz: Tz) -> String {
    format_instant(&now_in(tz))
}

/// Parse an ISO-8601 timestamp that carries an explicit offset.
/// A trailing `Z` counts as `+00:00`; naive values are rejected.
pub fn parse_iso8601(value: &str) -> ToolResult<DateTime<FixedOffset>> {
    let raw = value.trim();
    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(head) => format!("{}+00:00", head),
        None => raw.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Ok(dt);
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(raw, fmt).is_ok())
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
    if naive {
        return Err(ToolError::invalid_time("timezone offset required")
            .with_details(serde_json::json!({ "value": raw })));
    }
    Err(ToolError::invalid_time("invalid ISO8601 time")
        .with_details(serde_json::json!({ "value": raw })))
}

/// Canonical string form of a valid offset timestamp.
pub fn ensure_iso8601(value: &str) -> ToolResult<String> {
    parse_iso8601(value).map(|dt| format_instant(&dt))
}

/// Absolute timestamp first, then the natural-language resolver.
pub fn normalize_time_text(value: &str, tz: Tz) -> Option<String> {
    if let Ok(iso) = ensure_iso8601(value) {
        return Some(iso);
    }
    resolve(value, tz)
}
