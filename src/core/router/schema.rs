use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::error::{ErrorKind, ToolError, ToolResult};
use crate::core::tools::ToolName;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: ToolName,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub intent: String,
    pub confidence: f64,
    pub need_clarification: bool,
    #[serde(default)]
    pub clarify_question: Option<String>,
    #[serde(default)]
    pub reply_to_user: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

fn schema_error(errors: Vec<String>) -> ToolError {
    ToolError::new(ErrorKind::RouterInvalidSchema, "Router output schema invalid")
        .with_details(json!({ "errors": errors }))
}

impl RouterDecision {
    fn validate(&self) -> ToolResult<()> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.confidence) {
            errors.push(format!(
                "confidence: must be in range [0, 1], got {}",
                self.confidence
            ));
        }
        for (idx, call) in self.tool_calls.iter().enumerate() {
            if !call.name.is_draftable() {
                errors.push(format!(
                    "tool_calls[{}].name: {} cannot be proposed as a draft",
                    idx, call.name
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(schema_error(errors))
        }
    }
}

/// Parse raw model output. Unknown fields are ignored.
pub fn parse_decision(output: &str) -> ToolResult<RouterDecision> {
    let value: Value = serde_json::from_str(output).map_err(|e| {
        ToolError::new(ErrorKind::RouterInvalidJson, "Router output is not valid JSON")
            .with_details(json!({ "output": output, "error": e.to_string() }))
    })?;
    let decision: RouterDecision =
        serde_json::from_value(value).map_err(|e| schema_error(vec![e.to_string()]))?;
    decision.validate()?;
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_decision_with_defaults() {
        let d = parse_decision(
            r#"{"intent":"record","confidence":0.9,"need_clarification":false,"extra":1}"#,
        )
        .unwrap();
        assert!(d.tool_calls.is_empty());
        assert!(d.cards.is_empty());
        assert_eq!(d.clarify_question, None);
    }

    #[test]
    fn parses_tool_calls_and_cards() {
        let d = parse_decision(
            r#"{
                "intent": "expense",
                "confidence": 0.8,
                "need_clarification": false,
                "tool_calls": [{"name": "create_expense", "arguments": {"amount": 30}}, {"name": "create_mood"}],
                "cards": [{"card_id": "x", "type": "expense", "status": "new"}]
            }"#,
        )
        .unwrap();
        assert_eq!(d.tool_calls[0].name, ToolName::CreateExpense);
        assert_eq!(d.tool_calls[0].arguments["amount"], 30);
        assert!(d.tool_calls[1].arguments.is_empty());
        assert_eq!(d.cards[0].card_type, "expense");
        assert_eq!(d.cards[0].title, "");
    }

    #[test]
    fn non_json_is_invalid_json() {
        let err = parse_decision("sure! here you go").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidJson);
    }

    #[test]
    fn missing_required_field_is_invalid_schema() {
        let err = parse_decision(r#"{"intent":"x","confidence":0.5}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidSchema);
        let errors = &err.details.unwrap()["errors"];
        assert!(errors[0].as_str().unwrap().contains("need_clarification"));
    }

    #[test]
    fn unknown_tool_and_task_action_are_rejected() {
        let err = parse_decision(
            r#"{"intent":"x","confidence":0.5,"need_clarification":false,"tool_calls":[{"name":"rm_rf"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidSchema);

        let err = parse_decision(
            r#"{"intent":"x","confidence":0.5,"need_clarification":false,"tool_calls":[{"name":"task_action"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidSchema);
    }

    #[test]
    fn confidence_out_of_range() {
        let err = parse_decision(r#"{"intent":"x","confidence":7,"need_clarification":true}"#)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidSchema);
    }
}
