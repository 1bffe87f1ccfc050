use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;

#[derive(Debug, thiserror::Error)]
pub enum ConstantsError {
    #[error("constants file not found: {0}")]
    NotFound(String),
    #[error("invalid JSON in constants file {path}: line {line} col {column}")]
    Json {
        path: String,
        line: usize,
        column: usize,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub timezone: String,
    pub currency: String,
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseConfig {
    pub categories: Vec<String>,
    pub default_category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealConfig {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub status: Vec<String>,
    pub priority: Vec<String>,
    pub default_priority: String,
    pub default_status: String,
    pub default_remind_offset_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_tags: usize,
    pub max_text_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub types: Vec<String>,
}

/// Enumerations and defaults shared by every component. Built once at startup
/// and handed around as `Arc<AppConstants>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConstants {
    pub defaults: DefaultsConfig,
    pub expense: ExpenseConfig,
    pub meal: MealConfig,
    pub task: TaskConfig,
    pub limits: LimitsConfig,
    pub sources: Vec<String>,
    pub event: EventConfig,
}

/// Upper bound for `task.default_remind_offset_minutes`: one year.
pub const MAX_REMIND_OFFSET_MINUTES: i64 = 525_600;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConstants {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig {
                timezone: "Asia/Shanghai".to_string(),
                currency: "CNY".to_string(),
                confidence: 0.8,
                source: "chat_text".to_string(),
            },
            expense: ExpenseConfig {
                categories: strings(&[
                    "food",
                    "transport",
                    "shopping",
                    "entertainment",
                    "housing",
                    "medical",
                    "education",
                    "other",
                    "unknown",
                ]),
                default_category: "unknown".to_string(),
            },
            meal: MealConfig {
                types: strings(&["breakfast", "lunch", "dinner", "snack", "unknown"]),
            },
            task: TaskConfig {
                status: strings(&["todo", "doing", "done", "canceled"]),
                priority: strings(&["low", "medium", "high", "urgent"]),
                default_priority: "medium".to_string(),
                default_status: "todo".to_string(),
                default_remind_offset_minutes: 15,
            },
            limits: LimitsConfig {
                max_tags: 20,
                max_text_len: 2000,
            },
            sources: strings(&["chat_text", "chat_image", "chat_voice", "import"]),
            event: EventConfig {
                types: strings(&["expense", "lifelog", "meal", "mood"]),
            },
        }
    }
}

impl AppConstants {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConstantsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConstantsError::NotFound(path.display().to_string()))?;
        Self::from_json_str(text.trim_start_matches('\u{feff}'), &path.display().to_string())
    }

    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConstantsError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| ConstantsError::Json {
            path: origin.to_string(),
            line: e.line(),
            column: e.column(),
        })?;
        let constants: AppConstants = serde_json::from_value(value)
            .map_err(|e| ConstantsError::Invalid(format!("constants schema: {}", e)))?;
        constants.validate()?;
        Ok(constants)
    }

    fn validate(&self) -> Result<(), ConstantsError> {
        let invalid = |msg: &str| Err(ConstantsError::Invalid(msg.to_string()));

        Tz::from_str(&self.defaults.timezone).map_err(|_| {
            ConstantsError::Invalid(format!(
                "defaults.timezone is not a known zone: {}",
                self.defaults.timezone
            ))
        })?;
        if !(0.0..=1.0).contains(&self.defaults.confidence) {
            return invalid("defaults.confidence must be in range [0, 1]");
        }
        for (path, list) in [
            ("expense.categories", &self.expense.categories),
            ("meal.types", &self.meal.types),
            ("task.status", &self.task.status),
            ("task.priority", &self.task.priority),
            ("sources", &self.sources),
            ("event.types", &self.event.types),
        ] {
            if list.is_empty() {
                return Err(ConstantsError::Invalid(format!("{} must be non-empty list", path)));
            }
            if let Some(idx) = list.iter().position(|s| s.trim().is_empty()) {
                return Err(ConstantsError::Invalid(format!(
                    "{}[{}] must be non-empty string",
                    path, idx
                )));
            }
        }
        if !self.expense.categories.contains(&self.expense.default_category) {
            return invalid("expense.default_category must be in expense.categories");
        }
        if !self.task.priority.contains(&self.task.default_priority) {
            return invalid("task.default_priority must be in task.priority");
        }
        if !self.task.status.contains(&self.task.default_status) {
            return invalid("task.default_status must be in task.status");
        }
        if !(0..=MAX_REMIND_OFFSET_MINUTES).contains(&self.task.default_remind_offset_minutes) {
            return Err(ConstantsError::Invalid(format!(
                "task.default_remind_offset_minutes must be in range [0, {}]",
                MAX_REMIND_OFFSET_MINUTES
            )));
        }
        if self.limits.max_tags == 0 {
            return invalid("limits.max_tags must be > 0");
        }
        if self.limits.max_text_len == 0 {
            return invalid("limits.max_text_len must be > 0");
        }
        if !self.sources.contains(&self.defaults.source) {
            return invalid("defaults.source must be in sources");
        }
        Ok(())
    }

    /// Default timezone, already validated at load time.
    pub fn timezone(&self) -> Tz {
        Tz::from_str(&self.defaults.timezone).unwrap_or(chrono_tz::Asia::Shanghai)
    }
}
