use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::repository::{
    Datastore, GroupRepository, KycRepository, TokenRepository, UserRepository,
};
use super::ServiceError;
use crate::models::{
    Group, KycRecord, KycStatus, TokenType, User, VerificationToken, USER_UPDATED_AT,
};

const USERS_EMAIL_UNIQUE: &str = "users_email_unique";
const KYC_USER_UNIQUE: &str = "kyc_user_unique";
const KYC_NATIONAL_ID_UNIQUE: &str = "kyc_national_id_unique";
const GROUPS_SLUG_UNIQUE: &str = "groups_slug_unique";
const TOKENS_EXPIRY_TTL: &str = "tokens_expiry_ttl";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ServiceError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            ServiceError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), ServiceError> {
        tracing::info!("Creating MongoDB indexes for tirelire-service");

        self.users()
            .create_index(unique_index(doc! { "email": 1 }, USERS_EMAIL_UNIQUE), None)
            .await?;

        self.kyc_records()
            .create_index(unique_index(doc! { "user_id": 1 }, KYC_USER_UNIQUE), None)
            .await?;
        self.kyc_records()
            .create_index(
                unique_index(doc! { "national_id_number": 1 }, KYC_NATIONAL_ID_UNIQUE),
                None,
            )
            .await?;
        self.kyc_records()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "created_at": -1 })
                    .options(IndexOptions::builder().name("kyc_created_at".to_string()).build())
                    .build(),
                None,
            )
            .await?;

        self.groups()
            .create_index(unique_index(doc! { "slug": 1 }, GROUPS_SLUG_UNIQUE), None)
            .await?;

        // Expired tokens are already unredeemable; the TTL index only reclaims space.
        let ttl_index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name(TOKENS_EXPIRY_TTL.to_string())
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.tokens().create_index(ttl_index, None).await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn tokens(&self) -> Collection<VerificationToken> {
        self.db.collection("verification_tokens")
    }

    pub fn kyc_records(&self) -> Collection<KycRecord> {
        self.db.collection("kyc_records")
    }

    pub fn groups(&self) -> Collection<Group> {
        self.db.collection("groups")
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn unique_index(keys: mongodb::bson::Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(true)
                .build(),
        )
        .build()
}

/// Server message of a duplicate-key failure, which names the violated index.
fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => {
            Some(we.message.as_str())
        }
        ErrorKind::Command(ce) if ce.code == DUPLICATE_KEY => Some(ce.message.as_str()),
        _ => None,
    }
}

fn map_kyc_insert_error(err: mongodb::error::Error) -> ServiceError {
    match duplicate_key_message(&err) {
        Some(msg) if msg.contains(KYC_NATIONAL_ID_UNIQUE) => ServiceError::NationalIdInUse,
        Some(_) => ServiceError::KycAlreadySubmitted,
        None => ServiceError::from(err),
    }
}

fn returning_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn newest_first() -> FindOptions {
    FindOptions::builder().sort(doc! { "created_at": -1 }).build()
}

#[async_trait]
impl UserRepository for MongoDb {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.users()
            .insert_one(user, None)
            .await
            .map_err(|e| match duplicate_key_message(&e) {
                Some(_) => ServiceError::EmailAlreadyRegistered,
                None => ServiceError::from(e),
            })?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn mark_email_verified(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one_and_update(
                doc! { "email": email },
                doc! { "$set": { "email_verified": true, USER_UPDATED_AT: BsonDateTime::now() } },
                returning_after(),
            )
            .await?)
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one_and_update(
                doc! { "email": email },
                doc! {
                    "$set": {
                        "password_hash": password_hash,
                        "email_verified": true,
                        USER_UPDATED_AT: BsonDateTime::now(),
                    }
                },
                returning_after(),
            )
            .await?)
    }

    async fn record_login(&self, user_id: &str) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "last_login_at": BsonDateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "kyc_status": status.as_str(), USER_UPDATED_AT: BsonDateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for MongoDb {
    async fn insert_token(&self, token: &VerificationToken) -> Result<(), ServiceError> {
        self.tokens().insert_one(token, None).await?;
        Ok(())
    }

    async fn redeem_token(
        &self,
        token_type: TokenType,
        nonce: &str,
        email: &str,
    ) -> Result<Option<VerificationToken>, ServiceError> {
        Ok(self
            .tokens()
            .find_one_and_delete(
                doc! {
                    "_id": nonce,
                    "email": email,
                    "token_type": token_type.purpose(),
                    "expires_at": { "$gt": BsonDateTime::now() },
                },
                None,
            )
            .await?)
    }
}

#[async_trait]
impl KycRepository for MongoDb {
    async fn insert_kyc(&self, record: &KycRecord) -> Result<(), ServiceError> {
        self.kyc_records()
            .insert_one(record, None)
            .await
            .map_err(map_kyc_insert_error)?;
        Ok(())
    }

    async fn find_kyc_by_user(&self, user_id: &str) -> Result<Option<KycRecord>, ServiceError> {
        Ok(self
            .kyc_records()
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn find_kyc_by_id(&self, id: &str) -> Result<Option<KycRecord>, ServiceError> {
        Ok(self.kyc_records().find_one(doc! { "_id": id }, None).await?)
    }

    async fn national_id_in_use(&self, national_id_number: &str) -> Result<bool, ServiceError> {
        let count = self
            .kyc_records()
            .count_documents(doc! { "national_id_number": national_id_number }, None)
            .await?;
        Ok(count > 0)
    }

    async fn list_kyc(&self) -> Result<Vec<KycRecord>, ServiceError> {
        let cursor = self.kyc_records().find(doc! {}, newest_first()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace_kyc_if_unverified(&self, record: &KycRecord) -> Result<bool, ServiceError> {
        let result = self
            .kyc_records()
            .replace_one(
                doc! { "_id": &record.id, "facial_verification_completed": false },
                record,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn replace_kyc_if_unchanged(
        &self,
        record: &KycRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = self
            .kyc_records()
            .replace_one(
                doc! {
                    "_id": &record.id,
                    "updated_at": BsonDateTime::from_chrono(expected_updated_at),
                },
                record,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}

#[async_trait]
impl GroupRepository for MongoDb {
    async fn insert_group(&self, group: &Group) -> Result<(), ServiceError> {
        self.groups()
            .insert_one(group, None)
            .await
            .map_err(|e| match duplicate_key_message(&e) {
                Some(_) => ServiceError::SlugTaken,
                None => ServiceError::from(e),
            })?;
        Ok(())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.groups().find_one(doc! { "slug": slug }, None).await?)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        let cursor = self.groups().find(doc! {}, newest_first()).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl Datastore for MongoDb {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "MongoDB health check failed");
                ServiceError::from(e)
            })?;
        Ok(())
    }
}
