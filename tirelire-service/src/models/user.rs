//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::kyc::KycStatus;

/// Account role. Regular members serialize as `particulier`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[default]
    #[serde(rename = "particulier")]
    Standard,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "particulier",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "particulier" => Ok(Role::Standard),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Stored document. Field names follow the existing `users` collection
/// (`phone_number`, `isActive`, `createdAt`, `updatedAt`). The credential is
/// an argon2id PHC string under `password_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "phone_number", default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub email_verified: bool,
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub last_login_at: Option<mongodb::bson::DateTime>,
    #[serde(
        rename = "createdAt",
        with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "updatedAt",
        with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub updated_at: DateTime<Utc>,
}

/// Document key of [`User::updated_at`].
pub const USER_UPDATED_AT: &str = "updatedAt";

impl User {
    pub fn new(email: String, password_hash: String, first_name: String, last_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(&email),
            password_hash,
            first_name,
            last_name,
            phone: None,
            role: Role::Standard,
            is_active: true,
            email_verified: false,
            kyc_status: KycStatus::Pending,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser::from(self)
    }
}

/// Trimmed, lowercased form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Projection of [`User`] returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub kyc_status: KycStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for SanitizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            kyc_status: user.kyc_status,
            last_login_at: user.last_login_at.map(|dt| dt.to_chrono()),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
