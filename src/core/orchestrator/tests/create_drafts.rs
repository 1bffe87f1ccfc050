use serde_json::json;

use super::{StubRouter, decision, fixture, tools_of};
use crate::core::error::ErrorKind;
use crate::core::orchestrator::FALLBACK_CLARIFY_QUESTION;
use crate::core::router::RouterDecision;
use crate::core::store::LogStore;
use crate::core::tools::ToolName;

#[tokio::test]
async fn decision_becomes_one_draft_per_tool_call() {
    let fx = fixture(StubRouter::Decide(decision(json!([
        {"name": "create_expense", "arguments": {"amount": 30, "happened_at": "2024-01-10T12:00:00+08:00"}},
        {"name": "create_mood", "arguments": {"mood": "开心"}},
    ]))));
    let proposal = fx.orchestrator.create_drafts("午饭30，开心").await.unwrap();

    assert!(!proposal.need_clarification);
    assert_eq!(
        tools_of(&proposal.drafts),
        vec![ToolName::CreateExpense, ToolName::CreateMood]
    );
    assert_eq!(proposal.cards.len(), 2);
    let expense = &proposal.drafts[0];
    assert_eq!(expense.payload["happened_at"], json!("2024-01-10T12:00:00+08:00"));
    assert_eq!(expense.payload["idempotency_key"], json!(expense.draft_id));
    assert_eq!(proposal.cards[0].card_id, expense.draft_id);
    assert_ne!(proposal.drafts[0].draft_id, proposal.drafts[1].draft_id);
}

#[tokio::test]
async fn proposing_does_not_persist() {
    let fx = fixture(StubRouter::Decide(decision(json!([
        {"name": "create_task", "arguments": {"title": "call mom"}},
    ]))));
    let proposal = fx.orchestrator.create_drafts("x").await.unwrap();
    let id = &proposal.drafts[0].draft_id;
    assert!(fx.store.draft_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn clarification_passes_through_without_drafts() {
    let d: RouterDecision = serde_json::from_value(json!({
        "intent": "unknown",
        "confidence": 0.3,
        "need_clarification": true,
        "clarify_question": "花了多少钱？",
        "tool_calls": [{"name": "create_expense", "arguments": {}}],
    }))
    .unwrap();
    let fx = fixture(StubRouter::Decide(d));
    let proposal = fx.orchestrator.create_drafts("买了东西").await.unwrap();
    assert!(proposal.need_clarification);
    assert_eq!(proposal.clarify_question.as_deref(), Some("花了多少钱？"));
    assert!(proposal.drafts.is_empty());
}

#[tokio::test]
async fn fallback_covers_the_four_router_failures() {
    for kind in [
        ErrorKind::LlmUnavailable,
        ErrorKind::LlmError,
        ErrorKind::RouterInvalidJson,
        ErrorKind::RouterInvalidSchema,
    ] {
        let fx = fixture(StubRouter::Fail(kind));
        let proposal = fx.orchestrator.create_drafts("午饭花了30").await.unwrap();
        assert_eq!(tools_of(&proposal.drafts), vec![ToolName::CreateExpense], "{:?}", kind);
        let draft = &proposal.drafts[0];
        assert_eq!(draft.confidence, 0.6);
        assert_eq!(draft.payload["amount"], json!(30.0));
        assert_eq!(draft.payload["idempotency_key"], json!(draft.draft_id));
        assert_eq!(draft.card.card_type, "expense");
        assert_eq!(fx.router.calls(), 1);
    }
}

#[tokio::test]
async fn other_router_errors_propagate() {
    for kind in [ErrorKind::InvalidParam, ErrorKind::StorageError, ErrorKind::NotFound] {
        let fx = fixture(StubRouter::Fail(kind));
        let err = fx.orchestrator.create_drafts("午饭花了30").await.unwrap_err();
        assert_eq!(err.kind, kind);
    }
}

#[tokio::test]
async fn empty_fallback_asks_what_to_record() {
    let fx = fixture(StubRouter::Fail(ErrorKind::LlmUnavailable));
    let proposal = fx.orchestrator.create_drafts("hello there").await.unwrap();
    assert!(proposal.need_clarification);
    assert_eq!(proposal.clarify_question.as_deref(), Some(FALLBACK_CLARIFY_QUESTION));
    assert!(proposal.drafts.is_empty());
}

#[tokio::test]
async fn natural_language_task_times_are_resolved() {
    let fx = fixture(StubRouter::Decide(decision(json!([
        {"name": "create_task", "arguments": {"title": "开会", "due_at": "明天下午3点", "remind_at": "whenever"}},
    ]))));
    let proposal = fx.orchestrator.create_drafts("明天下午3点开会").await.unwrap();
    let payload = &proposal.drafts[0].payload;
    let due = payload["due_at"].as_str().unwrap();
    assert!(due.ends_with("T15:00:00+08:00"), "{}", due);
    assert!(payload["remind_at"].is_null());
}
