use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::repository::{
    Datastore, GroupRepository, KycRepository, TokenRepository, UserRepository,
};
use super::ServiceError;
use crate::models::{Group, KycRecord, KycStatus, TokenType, User, VerificationToken};

/// Process-local store with the same uniqueness guarantees as the Mongo
/// indexes. Each map is guarded by its own lock; checks and writes happen
/// under that lock.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, User>>,
    tokens: Mutex<HashMap<String, VerificationToken>>,
    kyc: Mutex<HashMap<String, KycRecord>>,
    groups: Mutex<HashMap<String, Group>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit a stored user in place, e.g. to promote a seeded account to admin.
    /// Returns `false` when no user has that email.
    pub fn update_user<F>(&self, email: &str, edit: F) -> Result<bool, ServiceError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = lock(&self.users)?;
        match users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                edit(user);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ServiceError> {
    mutex
        .lock()
        .map_err(|_| ServiceError::Internal(anyhow::anyhow!("in-memory store lock poisoned")))
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::EmailAlreadyRegistered);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users)?.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users)?.get(id).cloned())
    }

    async fn mark_email_verified(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let mut users = lock(&self.users)?;
        Ok(users.values_mut().find(|u| u.email == email).map(|u| {
            u.email_verified = true;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, ServiceError> {
        let mut users = lock(&self.users)?;
        Ok(users.values_mut().find(|u| u.email == email).map(|u| {
            u.password_hash = password_hash.to_string();
            u.email_verified = true;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn record_login(&self, user_id: &str) -> Result<(), ServiceError> {
        if let Some(user) = lock(&self.users)?.get_mut(user_id) {
            user.last_login_at = Some(Utc::now().into());
        }
        Ok(())
    }

    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<(), ServiceError> {
        if let Some(user) = lock(&self.users)?.get_mut(user_id) {
            user.kyc_status = status;
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn insert_token(&self, token: &VerificationToken) -> Result<(), ServiceError> {
        lock(&self.tokens)?.insert(token.nonce.clone(), token.clone());
        Ok(())
    }

    async fn redeem_token(
        &self,
        token_type: TokenType,
        nonce: &str,
        email: &str,
    ) -> Result<Option<VerificationToken>, ServiceError> {
        let mut tokens = lock(&self.tokens)?;
        let matches = tokens.get(nonce).is_some_and(|t| {
            t.token_type == token_type && t.email == email && !t.is_expired()
        });
        Ok(if matches { tokens.remove(nonce) } else { None })
    }
}

#[async_trait]
impl KycRepository for InMemoryStore {
    async fn insert_kyc(&self, record: &KycRecord) -> Result<(), ServiceError> {
        let mut kyc = lock(&self.kyc)?;
        if kyc.values().any(|k| k.user_id == record.user_id) {
            return Err(ServiceError::KycAlreadySubmitted);
        }
        if kyc
            .values()
            .any(|k| k.national_id_number == record.national_id_number)
        {
            return Err(ServiceError::NationalIdInUse);
        }
        kyc.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_kyc_by_user(&self, user_id: &str) -> Result<Option<KycRecord>, ServiceError> {
        Ok(lock(&self.kyc)?
            .values()
            .find(|k| k.user_id == user_id)
            .cloned())
    }

    async fn find_kyc_by_id(&self, id: &str) -> Result<Option<KycRecord>, ServiceError> {
        Ok(lock(&self.kyc)?.get(id).cloned())
    }

    async fn national_id_in_use(&self, national_id_number: &str) -> Result<bool, ServiceError> {
        Ok(lock(&self.kyc)?
            .values()
            .any(|k| k.national_id_number == national_id_number))
    }

    async fn list_kyc(&self) -> Result<Vec<KycRecord>, ServiceError> {
        let mut records: Vec<KycRecord> = lock(&self.kyc)?.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn replace_kyc_if_unverified(&self, record: &KycRecord) -> Result<bool, ServiceError> {
        let mut kyc = lock(&self.kyc)?;
        match kyc.get_mut(&record.id) {
            Some(stored) if !stored.facial_verification_completed => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_kyc_if_unchanged(
        &self,
        record: &KycRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut kyc = lock(&self.kyc)?;
        match kyc.get_mut(&record.id) {
            Some(stored) if stored.updated_at == expected_updated_at => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError> {
        let mut groups = lock(&self.groups)?;
        if groups.values().any(|g| g.slug == group.slug) {
            return Err(ServiceError::SlugTaken);
        }
        groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, ServiceError> {
        Ok(lock(&self.groups)?
            .values()
            .find(|g| g.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        let mut groups: Vec<Group> = lock(&self.groups)?.values().cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }
}

#[async_trait]
impl Datastore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, PersonalDetails};
    use chrono::{Duration, NaiveDate};

    fn kyc_for(user_id: &str, national_id: &str) -> KycRecord {
        KycRecord::new(
            user_id.to_string(),
            PersonalDetails {
                first_name: "Y".into(),
                last_name: "Z".into(),
                birth_date: NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
                address: Address {
                    street: "1 av".into(),
                    city: "Rabat".into(),
                    postal_code: "10000".into(),
                    country: "Maroc".into(),
                },
                national_id_number: national_id.to_string(),
            },
            "http://x/uploads/id.png".into(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryStore::new();
        let a = User::new("a@x.fr".into(), "h".into(), "A".into(), "B".into());
        let b = User::new("a@x.fr".into(), "h".into(), "C".into(), "D".into());
        store.insert_user(&a).await.unwrap();
        assert!(matches!(
            store.insert_user(&b).await,
            Err(ServiceError::EmailAlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn token_redeems_once_and_only_with_matching_binding() {
        let store = InMemoryStore::new();
        let token = VerificationToken::new(
            TokenType::PasswordReset,
            "nonce-1".into(),
            "a@x.fr".into(),
            Duration::hours(1),
        );
        store.insert_token(&token).await.unwrap();

        assert!(store
            .redeem_token(TokenType::PasswordReset, "nonce-1", "other@x.fr")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .redeem_token(TokenType::EmailVerification, "nonce-1", "a@x.fr")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .redeem_token(TokenType::PasswordReset, "nonce-1", "a@x.fr")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .redeem_token(TokenType::PasswordReset, "nonce-1", "a@x.fr")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_token_is_not_redeemable() {
        let store = InMemoryStore::new();
        let token = VerificationToken::new(
            TokenType::EmailVerification,
            "old".into(),
            "a@x.fr".into(),
            Duration::seconds(-5),
        );
        store.insert_token(&token).await.unwrap();
        assert!(store
            .redeem_token(TokenType::EmailVerification, "old", "a@x.fr")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn kyc_uniqueness_per_user_and_national_id() {
        let store = InMemoryStore::new();
        store.insert_kyc(&kyc_for("u1", "ID1")).await.unwrap();

        assert!(matches!(
            store.insert_kyc(&kyc_for("u1", "ID2")).await,
            Err(ServiceError::KycAlreadySubmitted)
        ));
        assert!(matches!(
            store.insert_kyc(&kyc_for("u2", "ID1")).await,
            Err(ServiceError::NationalIdInUse)
        ));
    }

    #[tokio::test]
    async fn conditional_replace_loses_after_completion() {
        let store = InMemoryStore::new();
        let mut record = kyc_for("u1", "ID1");
        store.insert_kyc(&record).await.unwrap();

        record.complete_self_validation(0.9, "http://x/uploads/s.png".into());
        assert!(store.replace_kyc_if_unverified(&record).await.unwrap());
        assert!(!store.replace_kyc_if_unverified(&record).await.unwrap());
    }

    #[tokio::test]
    async fn replace_if_unchanged_rejects_stale_copies() {
        let store = InMemoryStore::new();
        let original = kyc_for("u1", "ID1");
        store.insert_kyc(&original).await.unwrap();
        let read_at = original.updated_at;

        let mut validated = original.clone();
        validated.complete_self_validation(0.9, "http://x/uploads/s.png".into());
        assert!(store.replace_kyc_if_unverified(&validated).await.unwrap());

        let mut stale = original.clone();
        stale.apply_review(crate::models::ReviewDecision::MarkInReview, "admin-1", None);
        assert!(!store
            .replace_kyc_if_unchanged(&stale, read_at)
            .await
            .unwrap());

        let stored = store.find_kyc_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(
            stored.selfie_image_url.as_deref(),
            Some("http://x/uploads/s.png")
        );
        assert!(store
            .replace_kyc_if_unchanged(&stale, stored.updated_at)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn password_update_marks_email_verified() {
        let store = InMemoryStore::new();
        let user = User::new("a@x.fr".into(), "h".into(), "A".into(), "B".into());
        store.insert_user(&user).await.unwrap();

        let updated = store.update_password("a@x.fr", "h2").await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "h2");
        assert!(updated.email_verified);
    }
}
