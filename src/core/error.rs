use serde_json::Value;

/// Stable error categories surfaced to callers as `(code, message)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParam,
    InvalidTime,
    InvalidTag,
    TooManyTags,
    NotFound,
    InvalidTool,
    UnsupportedEdit,
    LlmUnavailable,
    LlmError,
    RouterInvalidJson,
    RouterInvalidSchema,
    StorageError,
    InvalidJson,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidParam => "invalid_param",
            ErrorKind::InvalidTime => "invalid_time",
            ErrorKind::InvalidTag => "invalid_tag",
            ErrorKind::TooManyTags => "too_many_tags",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTool => "invalid_tool",
            ErrorKind::UnsupportedEdit => "unsupported_edit",
            ErrorKind::LlmUnavailable => "llm_unavailable",
            ErrorKind::LlmError => "llm_error",
            ErrorKind::RouterInvalidJson => "router_invalid_json",
            ErrorKind::RouterInvalidSchema => "router_invalid_schema",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::InvalidJson => "invalid_json",
        }
    }

    /// Router failures that the orchestrator recovers from with heuristics.
    pub fn is_fallback_eligible(self) -> bool {
        matches!(
            self,
            ErrorKind::LlmUnavailable
                | ErrorKind::LlmError
                | ErrorKind::RouterInvalidJson
                | ErrorKind::RouterInvalidSchema
        )
    }

    /// Malformed model output; the only kinds the router repairs by re-prompting.
    pub fn is_repairable(self) -> bool {
        matches!(
            self,
            ErrorKind::RouterInvalidJson | ErrorKind::RouterInvalidSchema
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParam, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_time(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTime, message)
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::StorageError, err.to_string())
    }
}

impl From<rusqlite::Error> for ToolError {
    fn from(err: rusqlite::Error) -> Self {
        ToolError::storage(err)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::storage(format!("stored JSON is corrupt: {}", err))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = ToolError::not_found("draft not found");
        assert_eq!(err.to_string(), "not_found: draft not found");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn only_router_and_llm_kinds_fall_back() {
        assert!(ErrorKind::LlmUnavailable.is_fallback_eligible());
        assert!(ErrorKind::RouterInvalidSchema.is_fallback_eligible());
        assert!(!ErrorKind::InvalidParam.is_fallback_eligible());
        assert!(!ErrorKind::StorageError.is_fallback_eligible());
    }

    #[test]
    fn transport_errors_are_not_repairable() {
        assert!(ErrorKind::RouterInvalidJson.is_repairable());
        assert!(!ErrorKind::LlmError.is_repairable());
        assert!(!ErrorKind::LlmUnavailable.is_repairable());
    }

    #[test]
    fn kind_serializes_as_wire_code() {
        let v = serde_json::to_value(ErrorKind::UnsupportedEdit).unwrap();
        assert_eq!(v, "unsupported_edit");
    }
}
