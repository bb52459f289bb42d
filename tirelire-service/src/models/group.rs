use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_MAX_MEMBERS: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_by: String,
    pub max_members: u32,
    pub tags: Vec<String>,
    pub is_private: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, slug: String, created_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            description: None,
            created_by,
            max_members: DEFAULT_MAX_MEMBERS,
            tags: Vec::new(),
            is_private: false,
            created_at: Utc::now(),
        }
    }

    /// Private groups are only visible to their creator and to admins.
    pub fn is_visible_to(&self, user_id: &str, is_admin: bool) -> bool {
        !self.is_private || is_admin || self.created_by == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub max_members: u32,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            slug: group.slug,
            description: group.description,
            created_by: group.created_by,
            max_members: group.max_members,
            tags: group.tags,
            is_private: group.is_private,
            created_at: group.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_group_visibility() {
        let mut group = Group::new("Tontine".into(), "tontine".into(), "owner".into());
        assert!(group.is_visible_to("stranger", false));

        group.is_private = true;
        assert!(group.is_visible_to("owner", false));
        assert!(group.is_visible_to("someone", true));
        assert!(!group.is_visible_to("stranger", false));
    }
}
