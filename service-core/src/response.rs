//! Typed success envelope shared by all JSON endpoints.
//!
//! Every successful response has the shape
//! `{ "success": true, "message": "...", "data": ..., "statusCode": 200 }`.
//! Failures use [`crate::error::ErrorEnvelope`] through `AppError`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            status_code: status.as_u16(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::success(data, message, StatusCode::OK)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::success(data, message, StatusCode::CREATED)
    }
}

impl ApiResponse<()> {
    /// Success without a payload.
    pub fn message(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            status_code: status.as_u16(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
