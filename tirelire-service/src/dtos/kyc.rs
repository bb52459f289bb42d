use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::utils::{MultipartForm, UploadedImage};

/// KYC submission read from a multipart form.
#[derive(Debug, Clone, Validate)]
pub struct SubmitKycRequest {
    #[validate(length(min = 1, max = 50, message = "Le prénom est requis"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Le nom est requis"))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50, message = "Le numéro de carte nationale est requis"))]
    pub national_id_number: String,
    /// `YYYY-MM-DD`; parsed and range-checked by the workflow.
    pub date_of_birth: String,
    #[validate(length(min = 1, max = 200, message = "La rue est requise"))]
    pub street: String,
    #[validate(length(min = 1, max = 100, message = "La ville est requise"))]
    pub city: String,
    #[validate(length(min = 1, max = 20, message = "Le code postal est requis"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100, message = "Le pays est requis"))]
    pub country: String,
    pub national_id_image: Option<UploadedImage>,
}

impl SubmitKycRequest {
    pub fn from_form(mut form: MultipartForm) -> Self {
        let national_id_image = form.take_file("nationalIdImage");
        let field = |name: &str| form.text(name).unwrap_or_default();
        Self {
            first_name: field("firstName"),
            last_name: field("lastName"),
            national_id_number: field("nationalIdNumber"),
            date_of_birth: field("dateOfBirth"),
            street: field("street"),
            city: field("city"),
            postal_code: field("postalCode"),
            country: field("country"),
            national_id_image,
        }
    }
}

/// Admin decision on a KYC case, read from a multipart form.
#[derive(Debug, Clone)]
pub struct AdminReviewRequest {
    pub kyc_id: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub selfie_image: Option<UploadedImage>,
}

impl AdminReviewRequest {
    pub fn from_form(mut form: MultipartForm) -> Self {
        Self {
            kyc_id: form.text("kycId").unwrap_or_default(),
            status: form.text("status").unwrap_or_default(),
            rejection_reason: form.text("rejectionReason"),
            selfie_image: form.take_file("selfieImage"),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct KycQuery {
    /// Defaults to the caller's own record.
    pub kyc_id: Option<String>,
}

/// OpenAPI shape of the `POST /service/kyc` form.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct KycSubmissionForm {
    pub first_name: String,
    pub last_name: String,
    pub national_id_number: String,
    #[schema(example = "1990-04-12")]
    pub date_of_birth: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[schema(value_type = String, format = Binary)]
    pub national_id_image: Vec<u8>,
}

/// OpenAPI shape of the `POST /service/kyc/validate` form.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct SelfieForm {
    #[schema(value_type = String, format = Binary)]
    pub selfie_image: Vec<u8>,
}

/// OpenAPI shape of the `POST /service/kyc/admin/validate` form.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct AdminReviewForm {
    pub kyc_id: String,
    /// One of `pending`, `in_review`, `approved`, `rejected`.
    #[schema(example = "rejected")]
    pub status: String,
    /// Required when rejecting.
    pub rejection_reason: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub selfie_image: Option<Vec<u8>>,
}
