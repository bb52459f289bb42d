use axum::extract::{Path, State};
use service_core::{error::AppError, response::ApiResponse};

use crate::{
    dtos::{group::CreateGroupRequest, ErrorResponse},
    middleware::AuthUser,
    models::GroupResponse,
    utils::ValidatedJson,
    AppState,
};

/// Create a savings group
#[utoipa::path(
    post,
    path = "/api/group",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "A group with this name already exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn create_group(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<ApiResponse<GroupResponse>, AppError> {
    let group = state.groups.create(&user.user_id, req).await?;
    Ok(ApiResponse::created(group, "Groupe créé avec succès"))
}

/// List the groups visible to the caller
#[utoipa::path(
    get,
    path = "/api/group",
    responses(
        (status = 200, description = "Visible groups, possibly none", body = [GroupResponse])
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn list_groups(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<GroupResponse>>, AppError> {
    let groups = state.groups.list(&user.user_id, user.is_admin()).await?;
    let message = if groups.is_empty() {
        "Aucun groupe trouvé"
    } else {
        "Groupes récupérés avec succès"
    };
    Ok(ApiResponse::ok(groups, message))
}

#[utoipa::path(
    get,
    path = "/api/group/{slug}",
    params(("slug" = String, Path, description = "Group slug")),
    responses(
        (status = 200, description = "Group", body = GroupResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn get_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<ApiResponse<GroupResponse>, AppError> {
    let group = state
        .groups
        .get_by_slug(&user.user_id, user.is_admin(), &slug)
        .await?;
    Ok(ApiResponse::ok(group, "Groupe récupéré avec succès"))
}
