use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::Role, AppState};

/// Identity of the caller, resolved from the bearer token and the stored user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Requires `Authorization: Bearer <jwt>` naming an existing, active user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Token d'authentification manquant")))?;

    let user = state.auth.authenticate(token).await?;

    // Role comes from the stored user, so a demotion applies to live tokens.
    req.extensions_mut().insert(AuthUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth user missing from request extensions"
            ))
        })
    }
}
