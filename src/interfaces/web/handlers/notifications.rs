use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::ApiResult;
use crate::core::error::ToolError;
use crate::core::store::types::NotificationRecord;
use crate::core::time;
use crate::interfaces::web::AppState;

pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_unread_only")]
    unread_only: bool,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_unread_only() -> bool {
    true
}

fn default_limit() -> i64 {
    20
}

pub async fn list_notifications_endpoint(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    if !(1..=MAX_LIMIT).contains(&query.limit) {
        return Err(ToolError::invalid_param("limit must be in 1..200").into());
    }
    let items = state
        .store
        .list_notifications(query.unread_only, query.limit as usize)
        .await?;
    Ok(Json(json!({ "total": items.len(), "items": items })))
}

pub async fn mark_read_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<NotificationRecord> {
    if id <= 0 {
        return Err(ToolError::invalid_param("notification_id must be positive integer").into());
    }
    let now = time::now_iso8601(state.tz);
    Ok(Json(state.store.mark_notification_read(id, &now).await?))
}
