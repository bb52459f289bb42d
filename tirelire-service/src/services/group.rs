use std::sync::Arc;

use super::repository::GroupRepository;
use super::ServiceError;
use crate::dtos::group::CreateGroupRequest;
use crate::models::group::DEFAULT_MAX_MEMBERS;
use crate::models::{Group, GroupResponse};
use crate::utils::slugify;

const GROUP_NOT_FOUND: &str = "Groupe non trouvé";

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupRepository>) -> Self {
        Self { groups }
    }

    pub async fn create(
        &self,
        creator_id: &str,
        req: CreateGroupRequest,
    ) -> Result<GroupResponse, ServiceError> {
        let name = req.name.trim().to_string();
        let name_len = name.chars().count();
        if !(3..=100).contains(&name_len) {
            return Err(ServiceError::Validation(
                "Le nom doit contenir entre 3 et 100 caractères".to_string(),
            ));
        }

        let max_members = req.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        if !(2..=100).contains(&max_members) {
            return Err(ServiceError::Validation(
                "Le nombre de membres doit être compris entre 2 et 100".to_string(),
            ));
        }

        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ServiceError::Validation(
                "Le nom doit contenir au moins une lettre ou un chiffre".to_string(),
            ));
        }

        let mut group = Group::new(name, slug, creator_id.to_string());
        group.description = req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        group.max_members = max_members;
        group.tags = req
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        group.is_private = req.is_private.unwrap_or(false);

        self.groups.insert_group(&group).await?;
        tracing::info!(group_id = %group.id, slug = %group.slug, "Group created");
        Ok(group.into())
    }

    pub async fn list(
        &self,
        caller_id: &str,
        caller_is_admin: bool,
    ) -> Result<Vec<GroupResponse>, ServiceError> {
        Ok(self
            .groups
            .list_groups()
            .await?
            .into_iter()
            .filter(|g| g.is_visible_to(caller_id, caller_is_admin))
            .map(GroupResponse::from)
            .collect())
    }

    /// Private groups the caller cannot see are reported as missing.
    pub async fn get_by_slug(
        &self,
        caller_id: &str,
        caller_is_admin: bool,
        slug: &str,
    ) -> Result<GroupResponse, ServiceError> {
        self.groups
            .find_group_by_slug(slug)
            .await?
            .filter(|g| g.is_visible_to(caller_id, caller_is_admin))
            .map(GroupResponse::from)
            .ok_or_else(|| ServiceError::NotFound(GROUP_NOT_FOUND.to_string()))
    }
}
