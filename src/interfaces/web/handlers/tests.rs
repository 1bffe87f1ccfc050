use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use crate::core::constants::AppConstants;
use crate::core::orchestrator::Orchestrator;
use crate::core::router::RouterClient;
use crate::core::settings::LlmSettings;
use crate::core::store::Store;
use crate::core::store::types::NewNotification;
use crate::core::tools::{DomainTools, LedgerTools};
use crate::interfaces::web::{AppState, build_api_router};

fn app_state() -> AppState {
    let store = crate::core::store::test_store();
    let constants = Arc::new(AppConstants::default());
    let tools: Arc<dyn DomainTools> = Arc::new(LedgerTools::new(store.clone(), constants.clone()));
    let orchestrator = Orchestrator::new(
        Arc::new(RouterClient::new(None)),
        Arc::new(store.clone()),
        tools.clone(),
        constants.clone(),
    );
    AppState::new(
        Arc::new(orchestrator),
        store,
        tools,
        LlmSettings::default(),
        false,
        constants.timezone(),
    )
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let app = build_api_router(state.clone(), 8787);
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn chat(state: &AppState, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(state, req).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn malformed_body_is_invalid_json() {
    let state = app_state();
    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "invalid_json");
}

#[tokio::test]
async fn text_without_model_falls_back_and_persists() {
    let state = app_state();
    let (status, body) = chat(&state, json!({ "text": "午饭花了30", "request_id": "r-1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], "r-1");
    assert_eq!(body["drafts"][0]["tool_name"], "create_expense");
    assert_eq!(body["drafts"][0]["status"], "draft");
    assert_eq!(body["cards"][0]["type"], "expense");
}

#[tokio::test]
async fn unrecognized_text_asks_for_clarification() {
    let state = app_state();
    let (status, body) = chat(&state, json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["need_clarification"], true);
    assert_eq!(body["clarify_question"], "你想记录什么？");
    assert_eq!(body["drafts"], json!([]));
}

#[tokio::test]
async fn confirm_then_undo() {
    let state = app_state();
    let (_, proposed) = chat(&state, json!({ "text": "记得给妈妈打电话" })).await;
    let draft_id = proposed["drafts"][0]["draft_id"].as_str().unwrap().to_string();

    let (status, committed) = chat(&state, json!({ "confirm_draft_ids": [draft_id] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(committed["committed"][0]["tool_name"], "create_task");
    let token = committed["undo_token"].as_str().unwrap().to_string();

    let (status, undone) = chat(&state, json!({ "undo_token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undone["undone"][0]["task"]["is_deleted"], 1);
}

#[tokio::test]
async fn mode_field_validation() {
    let state = app_state();
    let cases = [
        (json!({}), "invalid_param"),
        (json!({ "text": "   " }), "invalid_param"),
        (json!([1, 2]), "invalid_param"),
        (json!({ "confirm_draft_ids": "abc" }), "invalid_param"),
        (json!({ "confirm_draft_ids": ["nope"] }), "not_found"),
        (json!({ "undo_token": 5 }), "invalid_param"),
        (json!({ "action": "edit", "draft_id": "d" }), "invalid_param"),
        (json!({ "action": "edit", "draft_id": "d", "patch": {} }), "not_found"),
        (json!({ "action": "task_action", "task_id": "1", "op": "complete" }), "invalid_param"),
        (json!({ "action": "task_action", "task_id": 1, "op": "complete", "payload": [] }), "invalid_param"),
        (json!({ "action": "task_action", "task_id": 1, "op": "complete" }), "not_found"),
    ];
    for (body, code) in cases {
        let (status, resp) = chat(&state, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(resp["detail"]["code"], code, "{}", body);
        assert!(resp["detail"]["message"].is_string());
    }
}

#[tokio::test]
async fn health_reports_unconfigured_router() {
    let state = app_state();
    let (status, body) = send(&state, get("/router/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["llm_configured"], false);
    assert_eq!(body["model"], Value::Null);
}

async fn seed_notification(store: &Store) -> i64 {
    store
        .insert_notification(
            NewNotification {
                task_id: None,
                title: "Task Reminder".into(),
                content: Some("交报告".into()),
                scheduled_at: "2024-01-10T09:00:00+08:00".into(),
                sent_at: None,
            },
            "2024-01-10T09:00:00+08:00",
        )
        .await
        .unwrap()
        .notification_id
}

#[tokio::test]
async fn notifications_list_and_mark_read() {
    let state = app_state();
    let id = seed_notification(&state.store).await;

    let (status, body) = send(&state, get("/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["notification_id"], id);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/notifications/{}/read", id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["read_at"].is_string());

    let (_, body) = send(&state, get("/notifications?unread_only=true")).await;
    assert_eq!(body["total"], 0);
    let (_, body) = send(&state, get("/notifications?unread_only=false")).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn notification_bounds() {
    let state = app_state();
    let (status, body) = send(&state, get("/notifications?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "invalid_param");

    let req = Request::builder()
        .method("POST")
        .uri("/notifications/999/read")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "not_found");
}

fn patch_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn commit(state: &AppState, text: &str) {
    let (_, proposed) = chat(state, json!({ "text": text })).await;
    let draft_id = proposed["drafts"][0]["draft_id"].as_str().unwrap().to_string();
    let (status, _) = chat(state, json!({ "confirm_draft_ids": [draft_id] })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn events_search_by_type_and_text() {
    let state = app_state();
    commit(&state, "午饭花了30").await;

    let (status, body) = send(&state, get("/events?types=expense,mood")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["type"], "expense");

    let (_, body) = send(&state, get("/events?types=mood")).await;
    assert_eq!(body["total"], 0);

    let (status, body) = send(&state, get("/events?types=workout")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "invalid_param");

    let (status, body) = send(&state, get("/events?limit=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "invalid_param");

    let (status, body) = send(
        &state,
        get("/events?date_from=2000-01-01T00:00:00%2B08:00&limit=5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn tasks_search_update_and_due_lists() {
    let state = app_state();
    commit(&state, "记得给妈妈打电话").await;

    let (status, body) = send(&state, get("/tasks?status=todo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let task_id = body["items"][0]["task_id"].as_i64().unwrap();

    let (status, body) = send(
        &state,
        patch_json(
            &format!("/tasks/{}", task_id),
            json!({ "due_at": "2000-01-01T09:00:00+08:00", "priority": "high" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["priority"], "high");
    assert_eq!(body["due_at"], "2000-01-01T09:00:00+08:00");

    let (_, body) = send(&state, get("/tasks/overdue")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["task_id"], task_id);
    let (_, body) = send(&state, get("/tasks/today?timezone=Asia/Shanghai")).await;
    assert_eq!(body["total"], 0);

    let (status, body) = send(&state, get("/tasks/today?timezone=Moon/Base")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "invalid_param");

    let (status, body) = send(&state, patch_json(&format!("/tasks/{}", task_id), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["message"], "no fields to update");

    let (status, body) = send(&state, patch_json("/tasks/9999", json!({ "note": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["code"], "not_found");
}
