pub mod auth;
pub mod group;
pub mod kyc;

use serde::Serialize;
use utoipa::ToSchema;

/// Error envelope as rendered by `AppError`, for the OpenAPI document.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "Cet email est déjà utilisé")]
    pub message: String,
    #[schema(example = 409)]
    pub status_code: u16,
    /// Diagnostic detail, only outside production.
    pub error: Option<String>,
}
