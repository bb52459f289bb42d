use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 3, max = 100, message = "Le nom doit contenir entre 3 et 100 caractères"))]
    #[schema(example = "Tontine des amis")]
    pub name: String,

    #[validate(length(max = 500, message = "La description ne doit pas dépasser 500 caractères"))]
    pub description: Option<String>,

    #[validate(range(min = 2, max = 100, message = "Le nombre de membres doit être compris entre 2 et 100"))]
    #[schema(example = 10, minimum = 2, maximum = 100)]
    pub max_members: Option<u32>,

    pub tags: Option<Vec<String>>,

    pub is_private: Option<bool>,
}
