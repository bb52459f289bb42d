use axum::extract::{Multipart, Query, State};
use service_core::{error::AppError, middleware::tracing::RequestId, response::ApiResponse};
use validator::Validate;

use crate::{
    dtos::{
        kyc::{AdminReviewForm, AdminReviewRequest, KycQuery, KycSubmissionForm, SelfieForm, SubmitKycRequest},
        ErrorResponse,
    },
    middleware::AuthUser,
    models::KycResponse,
    utils::MultipartForm,
    AppState,
};

/// Submit identity details and the national ID image
#[utoipa::path(
    post,
    path = "/service/kyc",
    request_body(content = KycSubmissionForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "KYC case opened", body = KycResponse),
        (status = 400, description = "Missing field, bad date or image", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 409, description = "Already submitted or national ID in use", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "KYC"
)]
pub async fn submit_kyc(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<ApiResponse<KycResponse>, AppError> {
    let req = SubmitKycRequest::from_form(MultipartForm::read(multipart).await?);
    req.validate()?;

    let res = state.kyc.submit(&user.user_id, req).await?;
    Ok(ApiResponse::created(res, "Informations KYC soumises avec succès"))
}

/// Compare a selfie with the submitted national ID
#[utoipa::path(
    post,
    path = "/service/kyc/validate",
    request_body(content = SelfieForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Selfie matches, KYC approved", body = KycResponse),
        (status = 400, description = "Selfie missing or does not match", body = ErrorResponse),
        (status = 404, description = "No KYC case for this user", body = ErrorResponse),
        (status = 409, description = "Identity already verified", body = ErrorResponse),
        (status = 500, description = "Face match service failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "KYC"
)]
pub async fn self_validate(
    State(state): State<AppState>,
    user: AuthUser,
    request_id: RequestId,
    multipart: Multipart,
) -> Result<ApiResponse<KycResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let res = state
        .kyc
        .self_validate(
            &user.user_id,
            form.take_file("selfieImage"),
            Some(request_id.as_str()),
        )
        .await?;
    Ok(ApiResponse::ok(
        res,
        "Image correspond à la carte nationale d'identité",
    ))
}

/// Read a KYC case, by default the caller's own
#[utoipa::path(
    get,
    path = "/service/kyc",
    params(KycQuery),
    responses(
        (status = 200, description = "KYC case", body = KycResponse),
        (status = 403, description = "Case belongs to someone else", body = ErrorResponse),
        (status = 404, description = "No such case", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "KYC"
)]
pub async fn get_kyc(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KycQuery>,
) -> Result<ApiResponse<KycResponse>, AppError> {
    let kyc_id = query.kyc_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    let res = state.kyc.get(&user.user_id, user.is_admin(), kyc_id).await?;
    Ok(ApiResponse::ok(res, "Informations KYC récupérées avec succès"))
}

/// List every KYC case, newest first
#[utoipa::path(
    get,
    path = "/service/kyc/admin",
    responses(
        (status = 200, description = "All KYC cases", body = [KycResponse]),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "KYC Admin"
)]
pub async fn list_kyc(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<KycResponse>>, AppError> {
    let records = state.kyc.list().await?;
    let message = if records.is_empty() {
        "Aucun dossier KYC trouvé"
    } else {
        "Dossiers KYC récupérés avec succès"
    };
    Ok(ApiResponse::ok(records, message))
}

/// Record an admin decision on a KYC case
#[utoipa::path(
    post,
    path = "/service/kyc/admin/validate",
    request_body(content = AdminReviewForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Decision recorded", body = KycResponse),
        (status = 400, description = "Unknown status or missing rejection reason", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "No such case", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "KYC Admin"
)]
pub async fn admin_review(
    State(state): State<AppState>,
    admin: AuthUser,
    multipart: Multipart,
) -> Result<ApiResponse<KycResponse>, AppError> {
    let req = AdminReviewRequest::from_form(MultipartForm::read(multipart).await?);
    let res = state.kyc.admin_review(&admin.user_id, req).await?;
    Ok(ApiResponse::ok(res, "Décision KYC enregistrée"))
}
