use axum::extract::State;
use service_core::{error::AppError, response::ApiResponse};

use crate::{
    dtos::{
        auth::{AuthResponse, LoginRequest},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthResponse),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 403, description = "Email not verified or account disabled", body = ErrorResponse),
        (status = 404, description = "Unknown email", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let res = state.auth.login(req).await?;
    Ok(ApiResponse::ok(res, "Connexion réussie"))
}
