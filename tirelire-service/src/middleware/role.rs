use axum::{extract::Request, middleware::Next, response::Response};
use service_core::error::AppError;

use super::AuthUser;
use crate::models::Role;

/// Capability check: is `role` one of `allowed`?
pub fn ensure_role(role: Role, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Accès refusé : droits insuffisants"
        )))
    }
}

/// Route layer for admin-only endpoints. Must run after `auth_middleware`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let user = req.extensions().get::<AuthUser>().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Auth user missing from request extensions"
        ))
    })?;

    ensure_role(user.role, &[Role::Admin]).inspect_err(|_| {
        tracing::warn!(user_id = %user.user_id, role = user.role.as_str(), "Admin route refused");
    })?;

    Ok(next.run(req).await)
}
