use axum::{extract::State, http::StatusCode};
use service_core::{error::AppError, response::ApiResponse};

use crate::{
    dtos::{
        auth::{AuthResponse, EmailRequest, ResetPasswordRequest},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Request a password reset link
///
/// The answer is the same whether or not an account exists.
#[utoipa::path(
    post,
    path = "/api/auth/message/reset",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists"),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state.auth.request_password_reset(&req.email).await?;
    Ok(ApiResponse::message(
        "Si un compte existe pour cet email, un lien de réinitialisation a été envoyé",
        StatusCode::OK,
    ))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/api/auth/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed, session issued", body = AuthResponse),
        (status = 400, description = "Mismatch, short password or unusable token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let res = state.auth.reset_password(req).await?;
    Ok(ApiResponse::ok(res, "Mot de passe réinitialisé avec succès"))
}
