use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::SanitizedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Veuillez fournir un email valide"))]
    #[schema(example = "amina@example.com")]
    pub email: String,

    #[validate(length(min = 6, message = "Le mot de passe doit contenir au moins 6 caractères"))]
    #[schema(example = "motdepasse", min_length = 6)]
    pub password: String,

    #[schema(example = "motdepasse")]
    pub confirm_password: String,

    #[validate(length(min = 1, max = 50, message = "Le prénom est requis (50 caractères max)"))]
    #[schema(example = "Amina")]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Le nom est requis (50 caractères max)"))]
    #[schema(example = "Benali")]
    pub last_name: String,

    #[validate(length(max = 20, message = "Numéro de téléphone trop long"))]
    #[schema(example = "+212600000000")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: SanitizedUser,
    /// Whether the verification email left the server.
    pub mail_dispatched: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Veuillez fournir un email valide"))]
    #[schema(example = "amina@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Le mot de passe est requis"))]
    #[schema(example = "motdepasse")]
    pub password: String,
}

/// Sanitized user plus a bearer session token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: SanitizedUser,
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires.
    #[schema(example = 3600)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "Le token est requis"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Veuillez fournir un email valide"))]
    #[schema(example = "amina@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Le mot de passe doit contenir au moins 6 caractères"))]
    pub password: String,

    pub confirm_password: String,

    #[validate(length(min = 1, message = "Le token est requis"))]
    pub token: String,
}
