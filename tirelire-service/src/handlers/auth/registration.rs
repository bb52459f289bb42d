use axum::extract::State;
use service_core::{error::AppError, response::ApiResponse};

use crate::{
    dtos::{
        auth::{AuthResponse, EmailRequest, RegisterRequest, RegisterResponse, VerifyEmailRequest},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Create an account and send the email verification link
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, AppError> {
    let res = state.auth.register(req).await?;
    let message = if res.mail_dispatched {
        "Utilisateur inscrit avec succès, un email de validation a été envoyé"
    } else {
        "Utilisateur inscrit avec succès, l'email de validation n'a pas pu être envoyé"
    };
    Ok(ApiResponse::created(res, message))
}

/// Redeem an email verification token
#[utoipa::path(
    post,
    path = "/api/auth/validate",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified, session issued", body = AuthResponse),
        (status = 400, description = "Invalid, expired or already used token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let res = state.auth.verify_email(&req.token).await?;
    Ok(ApiResponse::ok(res, "Email vérifié avec succès"))
}

/// Send a fresh verification link
#[utoipa::path(
    post,
    path = "/api/auth/message/validate",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Verification email sent"),
        (status = 404, description = "No account for this email", body = ErrorResponse),
        (status = 409, description = "Email already verified", body = ErrorResponse),
        (status = 500, description = "Mail delivery failed", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_email_validation(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state.auth.request_email_validation(&req.email).await?;
    Ok(ApiResponse::message(
        "Email de validation envoyé",
        axum::http::StatusCode::OK,
    ))
}
