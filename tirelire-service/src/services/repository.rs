//! Persistence seams used by the workflows.
//!
//! [`MongoDb`](super::MongoDb) backs production; [`InMemoryStore`](super::InMemoryStore)
//! backs tests and local runs. Both enforce the same uniqueness rules and report
//! collisions as typed [`ServiceError`] conflicts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ServiceError;
use crate::models::{Group, KycRecord, KycStatus, TokenType, User, VerificationToken};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `EmailAlreadyRegistered` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError>;
    async fn mark_email_verified(&self, email: &str) -> Result<Option<User>, ServiceError>;
    /// Set a new password hash. Redeeming a reset token proves control of the
    /// mailbox, so the email is marked verified in the same write.
    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, ServiceError>;
    async fn record_login(&self, user_id: &str) -> Result<(), ServiceError>;
    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert_token(&self, token: &VerificationToken) -> Result<(), ServiceError>;

    /// Atomically delete and return the unexpired record matching all of
    /// `token_type`, `nonce` and `email`. A second call for the same token
    /// returns `None`.
    async fn redeem_token(
        &self,
        token_type: TokenType,
        nonce: &str,
        email: &str,
    ) -> Result<Option<VerificationToken>, ServiceError>;
}

#[async_trait]
pub trait KycRepository: Send + Sync {
    /// Fails with `KycAlreadySubmitted` or `NationalIdInUse` on collisions.
    async fn insert_kyc(&self, record: &KycRecord) -> Result<(), ServiceError>;
    async fn find_kyc_by_user(&self, user_id: &str) -> Result<Option<KycRecord>, ServiceError>;
    async fn find_kyc_by_id(&self, id: &str) -> Result<Option<KycRecord>, ServiceError>;
    async fn national_id_in_use(&self, national_id_number: &str) -> Result<bool, ServiceError>;
    /// Newest first.
    async fn list_kyc(&self) -> Result<Vec<KycRecord>, ServiceError>;
    /// Replace only if the stored record still has facial verification
    /// incomplete. Returns `false` when another writer got there first.
    async fn replace_kyc_if_unverified(&self, record: &KycRecord) -> Result<bool, ServiceError>;
    /// Replace only if the stored `updated_at` still equals `expected_updated_at`.
    /// Returns `false` when the record changed or no longer exists.
    async fn replace_kyc_if_unchanged(
        &self,
        record: &KycRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Fails with `SlugTaken` if the slug exists.
    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError>;
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, ServiceError>;
    /// Newest first.
    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError>;
}

/// Everything the application needs from a backing store.
#[async_trait]
pub trait Datastore:
    UserRepository + TokenRepository + KycRepository + GroupRepository + 'static
{
    async fn health_check(&self) -> Result<(), ServiceError>;
}
