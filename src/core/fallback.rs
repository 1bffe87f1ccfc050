//! Keyword and regex extraction used when the router cannot produce a decision.

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

use crate::core::tools::ToolName;

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)").unwrap());

const SPENDING_KEYWORDS: &[&str] = &["花", "消费", "付款", "支付", "买", "￥", "¥", "$"];
const TASK_KEYWORDS: &[&str] = &["提醒", "待办", "任务", "记得", "要做"];
const MOOD_WORDS: &[&str] = &[
    "开心", "难过", "烦", "焦虑", "生气", "高兴", "沮丧", "sad", "happy", "angry", "anxious",
];

pub const EXPENSE_CONFIDENCE: f64 = 0.6;
pub const TASK_CONFIDENCE: f64 = 0.55;
pub const MOOD_CONFIDENCE: f64 = 0.5;

/// A structured guess, not yet a persisted draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub tool: ToolName,
    pub arguments: Map<String, Value>,
    pub confidence: f64,
}

fn proposal(tool: ToolName, arguments: Value, confidence: f64) -> Proposal {
    Proposal {
        tool,
        arguments: arguments.as_object().cloned().unwrap_or_default(),
        confidence,
    }
}

fn extract_amount(text: &str) -> Option<f64> {
    AMOUNT.captures(text)?.get(1)?.as_str().parse().ok()
}

fn extract_mood(lowered: &str) -> Option<&'static str> {
    MOOD_WORDS.iter().copied().find(|m| lowered.contains(m))
}

/// Deterministic: the same text always yields the same proposals, in
/// expense, task, mood order.
pub fn extract(text: &str) -> Vec<Proposal> {
    let lowered = text.to_lowercase();
    let mut out = Vec::new();

    if let Some(amount) = extract_amount(text)
        && SPENDING_KEYWORDS.iter().any(|k| lowered.contains(k))
    {
        out.push(proposal(
            ToolName::CreateExpense,
            json!({ "amount": amount, "category": "unknown" }),
            EXPENSE_CONFIDENCE,
        ));
    }

    if TASK_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        out.push(proposal(
            ToolName::CreateTask,
            json!({ "title": text.trim() }),
            TASK_CONFIDENCE,
        ));
    }

    if let Some(mood) = extract_mood(&lowered) {
        out.push(proposal(
            ToolName::CreateMood,
            json!({ "mood": mood }),
            MOOD_CONFIDENCE,
        ));
    }

    out
}
