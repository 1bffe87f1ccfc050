use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{ApiError, ApiResult};
use crate::core::error::{ErrorKind, ToolError};
use crate::core::store::types::TaskRecord;
use crate::core::tools::{EventSearchArgs, TaskSearchArgs, TaskUpdateArgs};
use crate::interfaces::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    query: Option<String>,
    /// Comma-separated event types.
    types: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    query: Option<String>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ZoneQuery {
    timezone: Option<String>,
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError(ToolError::invalid_param(e.body_text())))
}

fn page_of<T: serde::Serialize>(items: Vec<T>) -> Json<Value> {
    Json(json!({ "total": items.len(), "items": items }))
}

pub async fn search_events_endpoint(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query_params(query)?;
    let types = q.types.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    });
    let items = state
        .tools
        .search_events(EventSearchArgs {
            query: q.query,
            types,
            date_from: q.date_from,
            date_to: q.date_to,
            limit: q.limit,
            offset: q.offset,
        })
        .await?;
    Ok(page_of(items))
}

pub async fn search_tasks_endpoint(
    State(state): State<AppState>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query_params(query)?;
    let items = state
        .tools
        .search_tasks(TaskSearchArgs {
            query: q.query,
            status: q.status,
            date_from: q.date_from,
            date_to: q.date_to,
            limit: q.limit,
            offset: q.offset,
        })
        .await?;
    Ok(page_of(items))
}

pub async fn tasks_today_endpoint(
    State(state): State<AppState>,
    query: Result<Query<ZoneQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query_params(query)?;
    let items = state.tools.list_tasks_today(q.timezone.as_deref()).await?;
    Ok(page_of(items))
}

pub async fn tasks_overdue_endpoint(
    State(state): State<AppState>,
    query: Result<Query<ZoneQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let q = query_params(query)?;
    let items = state.tools.list_tasks_overdue(q.timezone.as_deref()).await?;
    Ok(page_of(items))
}

fn json_body<T: DeserializeOwned>(payload: Result<Json<Value>, JsonRejection>) -> Result<T, ApiError> {
    let Ok(Json(body)) = payload else {
        return Err(ApiError(ToolError::new(
            ErrorKind::InvalidJson,
            "Request body must be JSON",
        )));
    };
    if !body.is_object() {
        return Err(ToolError::invalid_param("Request body must be a JSON object").into());
    }
    serde_json::from_value(body).map_err(|e| ApiError(ToolError::invalid_param(e.to_string())))
}

pub async fn update_task_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<TaskRecord> {
    let args: TaskUpdateArgs = json_body(payload)?;
    Ok(Json(state.tools.update_task(id, args).await?))
}
