use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::ToolName;
use crate::core::error::{ToolError, ToolResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

/// Accepts `3`, `3.5` or `"3.5"`; null or absent is `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", s))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseArgs {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub happened_at: Option<String>,
    pub tags: Option<Value>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifelogArgs {
    pub text: Option<String>,
    pub happened_at: Option<String>,
    pub tags: Option<Value>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MealArgs {
    pub meal_type: Option<String>,
    pub items: Option<Vec<String>>,
    pub happened_at: Option<String>,
    pub tags: Option<Value>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoodArgs {
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub intensity: Option<f64>,
    pub topic: Option<String>,
    pub note: Option<String>,
    pub happened_at: Option<String>,
    pub tags: Option<Value>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskArgs {
    pub title: Option<String>,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Value>,
    pub project: Option<String>,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSearchArgs {
    pub query: Option<String>,
    pub types: Option<Vec<String>>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSearchArgs {
    pub query: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Partial task edit; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdateArgs {
    pub title: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_at: Option<String>,
    pub remind_at: Option<String>,
    pub tags: Option<Value>,
    pub project: Option<String>,
    pub note: Option<String>,
}

/// A create-tool call with its arguments in typed form.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    Expense(ExpenseArgs),
    Lifelog(LifelogArgs),
    Meal(MealArgs),
    Mood(MoodArgs),
    Task(TaskArgs),
}

fn decode<T: DeserializeOwned>(tool: ToolName, payload: &Map<String, Value>) -> ToolResult<T> {
    serde_json::from_value(Value::Object(payload.clone())).map_err(|e| {
        ToolError::invalid_param(format!("invalid arguments for {}: {}", tool, e))
    })
}

impl ToolInvocation {
    /// Convert a persisted JSON payload. Unknown keys are ignored.
    pub fn from_payload(tool: ToolName, payload: &Map<String, Value>) -> ToolResult<Self> {
        Ok(match tool {
            ToolName::CreateExpense => Self::Expense(decode(tool, payload)?),
            ToolName::CreateLifelog => Self::Lifelog(decode(tool, payload)?),
            ToolName::CreateMeal => Self::Meal(decode(tool, payload)?),
            ToolName::CreateMood => Self::Mood(decode(tool, payload)?),
            ToolName::CreateTask => Self::Task(decode(tool, payload)?),
            ToolName::TaskAction => {
                return Err(ToolError::new(
                    crate::core::error::ErrorKind::InvalidTool,
                    "unsupported tool",
                )
                .with_details(serde_json::json!({ "tool_name": tool.as_str() })));
            }
        })
    }
}
