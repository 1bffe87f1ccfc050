use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{chat, health, notifications, records};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

pub(crate) fn build_api_router(state: AppState, api_port: u16) -> Router {
    Router::new()
        .route("/chat", post(chat::chat_endpoint))
        .route("/router/health", get(health::router_health_endpoint))
        .route("/notifications", get(notifications::list_notifications_endpoint))
        .route(
            "/notifications/{id}/read",
            post(notifications::mark_read_endpoint),
        )
        .route("/events", get(records::search_events_endpoint))
        .route("/tasks", get(records::search_tasks_endpoint))
        .route("/tasks/today", get(records::tasks_today_endpoint))
        .route("/tasks/overdue", get(records::tasks_overdue_endpoint))
        .route("/tasks/{id}", patch(records::update_task_endpoint))
        .layer(build_localhost_cors(api_port))
        .with_state(state)
}
