mod create_drafts;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::constants::AppConstants;
use crate::core::error::{ErrorKind, ToolError, ToolResult};
use crate::core::orchestrator::{Draft, Orchestrator};
use crate::core::router::{DecisionRouter, RouterDecision};
use crate::core::store::Store;
use crate::core::store::types::NewTask;
use crate::core::tools::{ToolName, test_tools};

/// Router double: either a fixed decision or a fixed failure kind.
pub(super) enum StubRouter {
    Decide(RouterDecision),
    Fail(ErrorKind),
}

pub(super) struct CountingRouter {
    inner: StubRouter,
    calls: AtomicUsize,
}

impl CountingRouter {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionRouter for CountingRouter {
    async fn route(&self, _text: &str) -> ToolResult<RouterDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            StubRouter::Decide(decision) => Ok(decision.clone()),
            StubRouter::Fail(kind) => Err(ToolError::new(*kind, "stubbed router failure")),
        }
    }
}

pub(super) struct Fixture {
    pub store: Store,
    pub router: Arc<CountingRouter>,
    pub orchestrator: Orchestrator,
}

pub(super) fn fixture(stub: StubRouter) -> Fixture {
    let (store, tools) = test_tools();
    let router = Arc::new(CountingRouter {
        inner: stub,
        calls: AtomicUsize::new(0),
    });
    let orchestrator = Orchestrator::new(
        router.clone(),
        Arc::new(store.clone()),
        Arc::new(tools),
        Arc::new(AppConstants::default()),
    );
    Fixture {
        store,
        router,
        orchestrator,
    }
}

pub(super) fn decision(calls: Value) -> RouterDecision {
    serde_json::from_value(serde_json::json!({
        "intent": "record",
        "confidence": 0.9,
        "need_clarification": false,
        "tool_calls": calls,
    }))
    .unwrap()
}

/// Route `text` through a stub decision and persist the resulting drafts.
pub(super) async fn persisted_drafts(calls: Value) -> (Fixture, Vec<Draft>) {
    let fx = fixture(StubRouter::Decide(decision(calls)));
    let proposal = fx.orchestrator.create_drafts("anything").await.unwrap();
    fx.orchestrator
        .save_drafts("req-1", &proposal.drafts)
        .await
        .unwrap();
    (fx, proposal.drafts)
}

pub(super) async fn seed_task(store: &Store, due_at: Option<&str>, remind_at: Option<&str>) -> i64 {
    store
        .insert_task(
            NewTask {
                title: "交报告".into(),
                status: "todo".into(),
                priority: "medium".into(),
                due_at: due_at.map(str::to_string),
                remind_at: remind_at.map(str::to_string),
                project: None,
                tags: vec!["work".into()],
                note: Some("季度".into()),
                idempotency_key: None,
            },
            "2024-01-10T09:00:00+08:00",
        )
        .await
        .unwrap()
        .task_id
}

pub(super) fn ids(drafts: &[Draft]) -> Vec<String> {
    drafts.iter().map(|d| d.draft_id.clone()).collect()
}

pub(super) fn tools_of(drafts: &[Draft]) -> Vec<ToolName> {
    drafts.iter().map(|d| d.tool_name).collect()
}
