use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::interfaces::web::AppState;

pub async fn router_health_endpoint(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "llm_configured": state.llm_configured,
        "model": state.llm.model,
        "base_url": state.llm.base_url,
    }))
}
