pub mod chat;
pub mod health;
pub mod notifications;
pub mod records;

#[cfg(test)]
mod tests;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::core::error::ToolError;

/// Every domain failure leaves the API as a 400 with its stable code.
pub struct ApiError(pub ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "detail": { "code": self.0.code(), "message": self.0.message }
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
