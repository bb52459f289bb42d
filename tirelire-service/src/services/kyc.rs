//! KYC workflow: submission, facial self-validation, admin review, queries.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use super::face_match::FaceMatcher;
use super::metrics::{record_face_match, record_kyc_decision, record_kyc_submission};
use super::repository::{KycRepository, UserRepository};
use super::storage::{ImageStorage, StoredImage};
use super::ServiceError;
use crate::dtos::kyc::{AdminReviewRequest, SubmitKycRequest};
use crate::models::{
    Address, KycRecord, KycResponse, KycStatus, PersonalDetails, ReviewDecision,
};
use crate::utils::UploadedImage;

const NO_KYC_FOR_USER: &str = "Aucune information KYC trouvée pour cet utilisateur";
const KYC_NOT_FOUND: &str = "Dossier KYC non trouvé";
const REVIEW_WRITE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct KycService {
    kyc: Arc<dyn KycRepository>,
    users: Arc<dyn UserRepository>,
    matcher: Arc<dyn FaceMatcher>,
    storage: Arc<dyn ImageStorage>,
}

impl KycService {
    pub fn new(
        kyc: Arc<dyn KycRepository>,
        users: Arc<dyn UserRepository>,
        matcher: Arc<dyn FaceMatcher>,
        storage: Arc<dyn ImageStorage>,
    ) -> Self {
        Self {
            kyc,
            users,
            matcher,
            storage,
        }
    }

    /// Open the caller's KYC case. Images are written only once every
    /// conflict check has passed.
    pub async fn submit(
        &self,
        user_id: &str,
        req: SubmitKycRequest,
    ) -> Result<KycResponse, ServiceError> {
        let birth_date = parse_birth_date(&req.date_of_birth)?;
        let image = req.national_id_image.ok_or_else(|| {
            ServiceError::Validation(
                "L'image de la carte nationale d'identité est requise".to_string(),
            )
        })?;
        self.storage.check(&image)?;

        let national_id_number = req.national_id_number.trim().to_string();
        if self.kyc.find_kyc_by_user(user_id).await?.is_some() {
            return Err(ServiceError::KycAlreadySubmitted);
        }
        if self.kyc.national_id_in_use(&national_id_number).await? {
            return Err(ServiceError::NationalIdInUse);
        }

        let stored = self.storage.store(image).await?;

        let record = KycRecord::new(
            user_id.to_string(),
            PersonalDetails {
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                birth_date,
                address: Address {
                    street: req.street.trim().to_string(),
                    city: req.city.trim().to_string(),
                    postal_code: req.postal_code.trim().to_string(),
                    country: req.country.trim().to_string(),
                },
                national_id_number,
            },
            stored.url.clone(),
        );

        // Concurrent submissions are settled by the unique indexes.
        if let Err(e) = self.kyc.insert_kyc(&record).await {
            tracing::warn!(user_id = %user_id, file = %stored.file_name, error = %e, "KYC insert rejected after upload");
            self.discard(&stored).await;
            return Err(e);
        }
        self.users.set_kyc_status(user_id, KycStatus::Pending).await?;

        tracing::info!(user_id = %user_id, kyc_id = %record.id, "KYC submitted");
        record_kyc_submission();
        Ok(record.into())
    }

    /// Compare a selfie against the stored ID image through the external scorer.
    pub async fn self_validate(
        &self,
        user_id: &str,
        selfie: Option<UploadedImage>,
        request_id: Option<&str>,
    ) -> Result<KycResponse, ServiceError> {
        let selfie = selfie
            .ok_or_else(|| ServiceError::Validation("Le selfie est requis".to_string()))?;
        self.storage.check(&selfie)?;

        let mut record = self
            .kyc
            .find_kyc_by_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NO_KYC_FOR_USER.to_string()))?;

        if record.facial_verification_completed {
            return Err(ServiceError::FacialVerificationCompleted);
        }

        let stored = self.storage.store(selfie).await?;
        let score = match self.score_selfie(&mut record, &stored, request_id).await {
            Ok(score) => score,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e);
            }
        };
        self.users
            .set_kyc_status(user_id, KycStatus::Approved)
            .await?;

        tracing::info!(kyc_id = %record.id, score = score, "KYC approved by facial match");
        record_kyc_decision("ai", KycStatus::Approved.as_str());
        Ok(record.into())
    }

    pub async fn admin_review(
        &self,
        admin_id: &str,
        req: AdminReviewRequest,
    ) -> Result<KycResponse, ServiceError> {
        if req.kyc_id.is_empty() {
            return Err(ServiceError::Validation("kycId est requis".to_string()));
        }
        let mut record = self.find_case(&req.kyc_id).await?;

        let decision = ReviewDecision::parse(&req.status, req.rejection_reason.as_deref())
            .map_err(ServiceError::Validation)?;

        let selfie = match req.selfie_image {
            Some(image) => {
                self.storage.check(&image)?;
                Some(self.storage.store(image).await?)
            }
            None => None,
        };

        if let Err(e) = self
            .write_review(&mut record, &decision, admin_id, selfie.as_ref())
            .await
        {
            if let Some(stored) = &selfie {
                self.discard(stored).await;
            }
            return Err(e);
        }

        let status = decision.status();
        self.users.set_kyc_status(&record.user_id, status).await?;

        tracing::info!(
            kyc_id = %record.id,
            admin_id = %admin_id,
            status = status.as_str(),
            "KYC reviewed by admin"
        );
        record_kyc_decision("human", status.as_str());
        Ok(record.into())
    }

    /// Score the selfie and, on a match, record the completed case.
    async fn score_selfie(
        &self,
        record: &mut KycRecord,
        selfie: &StoredImage,
        request_id: Option<&str>,
    ) -> Result<f64, ServiceError> {
        let result = self
            .matcher
            .compare(&record.national_id_image_url, &selfie.url, request_id)
            .await
            .inspect_err(|e| {
                tracing::error!(kyc_id = %record.id, error = %e, "Face match failed");
                record_face_match("error");
            })?;

        if !result.matched {
            tracing::info!(kyc_id = %record.id, score = result.score, "Selfie does not match ID");
            record_face_match("mismatch");
            return Err(ServiceError::FaceMismatch);
        }
        record_face_match("match");

        record.complete_self_validation(result.score, selfie.url.clone());
        if !self.kyc.replace_kyc_if_unverified(record).await? {
            return Err(ServiceError::FacialVerificationCompleted);
        }
        Ok(result.score)
    }

    /// Persist an admin decision against the version of the case it was made
    /// on. A concurrent write causes a re-read and the decision is applied again.
    async fn write_review(
        &self,
        record: &mut KycRecord,
        decision: &ReviewDecision,
        admin_id: &str,
        selfie: Option<&StoredImage>,
    ) -> Result<(), ServiceError> {
        for _ in 0..REVIEW_WRITE_ATTEMPTS {
            let read_at = record.updated_at;
            let mut reviewed = record.clone();
            reviewed.apply_review(decision.clone(), admin_id, selfie.map(|s| s.url.clone()));

            if self.kyc.replace_kyc_if_unchanged(&reviewed, read_at).await? {
                *record = reviewed;
                return Ok(());
            }
            tracing::info!(kyc_id = %record.id, "KYC case changed during review, re-reading");
            *record = self.find_case(&record.id).await?;
        }
        Err(ServiceError::KycModifiedConcurrently)
    }

    async fn find_case(&self, kyc_id: &str) -> Result<KycRecord, ServiceError> {
        self.kyc
            .find_kyc_by_id(kyc_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(KYC_NOT_FOUND.to_string()))
    }

    async fn discard(&self, image: &StoredImage) {
        if let Err(e) = self.storage.remove(image).await {
            tracing::warn!(file = %image.file_name, error = %e, "Failed to remove unreferenced upload");
        }
    }

    /// Without `kyc_id`, the caller's own record. Otherwise owners and admins only.
    pub async fn get(
        &self,
        caller_id: &str,
        caller_is_admin: bool,
        kyc_id: Option<&str>,
    ) -> Result<KycResponse, ServiceError> {
        let record = match kyc_id {
            Some(id) => {
                let record = self.find_case(id).await?;
                if record.user_id != caller_id && !caller_is_admin {
                    return Err(ServiceError::Forbidden(
                        "Vous n'avez pas accès à ce dossier KYC".to_string(),
                    ));
                }
                record
            }
            None => self
                .kyc
                .find_kyc_by_user(caller_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(NO_KYC_FOR_USER.to_string()))?,
        };

        Ok(record.into())
    }

    pub async fn list(&self) -> Result<Vec<KycResponse>, ServiceError> {
        Ok(self
            .kyc
            .list_kyc()
            .await?
            .into_iter()
            .map(KycResponse::from)
            .collect())
    }
}

fn parse_birth_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::Validation(
            "La date de naissance doit être au format AAAA-MM-JJ".to_string(),
        )
    })?;

    if date > Utc::now().date_naive() {
        return Err(ServiceError::Validation(
            "La date de naissance ne peut pas être dans le futur".to_string(),
        ));
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReviewSource, ReviewedBy, User};
    use crate::services::face_match::MockFaceMatcher;
    use crate::services::storage::LocalImageStorage;
    use crate::services::InMemoryStore;

    struct Fixture {
        service: KycService,
        store: Arc<InMemoryStore>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(matcher: MockFaceMatcher) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let storage = LocalImageStorage::new(dir.path(), "http://api", 5 * 1024 * 1024)
            .await
            .unwrap();
        let service = KycService::new(
            store.clone(),
            store.clone(),
            Arc::new(matcher),
            Arc::new(storage),
        );
        Fixture {
            service,
            store,
            _dir: dir,
        }
    }

    async fn seeded_user(store: &InMemoryStore, email: &str) -> User {
        let user = User::new(email.into(), "h".into(), "A".into(), "B".into());
        store.insert_user(&user).await.unwrap();
        user
    }

    fn png(field: &str) -> UploadedImage {
        UploadedImage {
            field_name: field.to_string(),
            file_name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        }
    }

    fn submission(national_id: &str) -> SubmitKycRequest {
        SubmitKycRequest {
            first_name: "Amina".into(),
            last_name: "Benali".into(),
            national_id_number: national_id.into(),
            date_of_birth: "1990-04-12".into(),
            street: "12 rue des Lilas".into(),
            city: "Casablanca".into(),
            postal_code: "20000".into(),
            country: "Maroc".into(),
            national_id_image: Some(png("nationalIdImage")),
        }
    }

    #[test]
    fn birth_date_must_be_past_and_well_formed() {
        assert!(parse_birth_date("1990-04-12").is_ok());
        assert!(parse_birth_date("12/04/1990").is_err());
        let tomorrow = (Utc::now() + chrono::Duration::days(1)).date_naive();
        assert!(parse_birth_date(&tomorrow.format("%Y-%m-%d").to_string()).is_err());
    }

    #[tokio::test]
    async fn submit_mirrors_pending_and_rejects_duplicates() {
        let fx = fixture(MockFaceMatcher::matching(0.9)).await;
        let alice = seeded_user(&fx.store, "alice@x.fr").await;
        let bob = seeded_user(&fx.store, "bob@x.fr").await;

        let kyc = fx.service.submit(&alice.id, submission("ID1")).await.unwrap();
        assert_eq!(kyc.status, KycStatus::Pending);
        assert!(kyc.national_id_image_url.starts_with("http://api/uploads/tirelire-image-"));

        assert!(matches!(
            fx.service.submit(&alice.id, submission("ID2")).await,
            Err(ServiceError::KycAlreadySubmitted)
        ));
        assert!(matches!(
            fx.service.submit(&bob.id, submission("ID1")).await,
            Err(ServiceError::NationalIdInUse)
        ));
    }

    #[tokio::test]
    async fn submit_requires_image() {
        let fx = fixture(MockFaceMatcher::matching(0.9)).await;
        let mut req = submission("ID1");
        req.national_id_image = None;
        assert!(matches!(
            fx.service.submit("u1", req).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn matching_selfie_approves_once() {
        let fx = fixture(MockFaceMatcher::matching(0.82)).await;
        let user = seeded_user(&fx.store, "a@x.fr").await;
        fx.service.submit(&user.id, submission("ID1")).await.unwrap();

        let kyc = fx
            .service
            .self_validate(&user.id, Some(png("selfieImage")), None)
            .await
            .unwrap();
        assert_eq!(kyc.status, KycStatus::Approved);
        assert_eq!(kyc.facial_verification_score, Some(0.82));
        assert_eq!(kyc.reviewed_by.map(|r| r.source), Some(ReviewSource::Ai));

        let stored = fx.store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.kyc_status, KycStatus::Approved);

        assert!(matches!(
            fx.service
                .self_validate(&user.id, Some(png("selfieImage")), None)
                .await,
            Err(ServiceError::FacialVerificationCompleted)
        ));
    }

    #[tokio::test]
    async fn mismatch_leaves_record_untouched() {
        let fx = fixture(MockFaceMatcher::mismatching(0.2)).await;
        let user = seeded_user(&fx.store, "a@x.fr").await;
        fx.service.submit(&user.id, submission("ID1")).await.unwrap();

        assert!(matches!(
            fx.service
                .self_validate(&user.id, Some(png("selfieImage")), None)
                .await,
            Err(ServiceError::FaceMismatch)
        ));
        let kyc = fx.service.get(&user.id, false, None).await.unwrap();
        assert!(!kyc.facial_verification_completed);
        assert_eq!(kyc.status, KycStatus::Pending);
    }

    fn files_in(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn failed_self_validation_removes_the_selfie() {
        let fx = fixture(MockFaceMatcher::mismatching(0.2)).await;
        let user = seeded_user(&fx.store, "a@x.fr").await;
        fx.service.submit(&user.id, submission("ID1")).await.unwrap();

        for _ in 0..3 {
            let _ = fx
                .service
                .self_validate(&user.id, Some(png("selfieImage")), None)
                .await;
        }
        assert_eq!(files_in(&fx._dir), 1);
    }

    #[tokio::test]
    async fn scorer_outage_is_a_service_error() {
        let fx = fixture(MockFaceMatcher::unavailable()).await;
        let user = seeded_user(&fx.store, "a@x.fr").await;
        fx.service.submit(&user.id, submission("ID1")).await.unwrap();

        assert!(matches!(
            fx.service
                .self_validate(&user.id, Some(png("selfieImage")), None)
                .await,
            Err(ServiceError::Scorer(_))
        ));
    }

    #[tokio::test]
    async fn admin_rejection_records_reason_and_reviewer() {
        let fx = fixture(MockFaceMatcher::matching(0.9)).await;
        let user = seeded_user(&fx.store, "a@x.fr").await;
        let kyc = fx.service.submit(&user.id, submission("ID1")).await.unwrap();

        let missing_reason = AdminReviewRequest {
            kyc_id: kyc.id.clone(),
            status: "rejected".into(),
            rejection_reason: None,
            selfie_image: None,
        };
        assert!(matches!(
            fx.service.admin_review("admin-1", missing_reason).await,
            Err(ServiceError::Validation(_))
        ));

        let reviewed = fx
            .service
            .admin_review(
                "admin-1",
                AdminReviewRequest {
                    kyc_id: kyc.id.clone(),
                    status: "rejected".into(),
                    rejection_reason: Some("Document illisible".into()),
                    selfie_image: Some(png("selfieImage")),
                },
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, KycStatus::Rejected);
        assert_eq!(reviewed.rejection_reason.as_deref(), Some("Document illisible"));
        assert_eq!(reviewed.reviewed_by, Some(ReviewedBy::human("admin-1")));
        assert!(reviewed.selfie_image_url.is_some());

        let stored = fx.store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.kyc_status, KycStatus::Rejected);
    }

    /// Delegates to the in-memory store, but lets a self-validation land
    /// between the admin's read and the admin's first write.
    struct InterleavedValidation {
        inner: Arc<InMemoryStore>,
        raced: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl KycRepository for InterleavedValidation {
        async fn insert_kyc(&self, record: &KycRecord) -> Result<(), ServiceError> {
            self.inner.insert_kyc(record).await
        }
        async fn find_kyc_by_user(&self, user_id: &str) -> Result<Option<KycRecord>, ServiceError> {
            self.inner.find_kyc_by_user(user_id).await
        }
        async fn find_kyc_by_id(&self, id: &str) -> Result<Option<KycRecord>, ServiceError> {
            self.inner.find_kyc_by_id(id).await
        }
        async fn national_id_in_use(&self, national_id_number: &str) -> Result<bool, ServiceError> {
            self.inner.national_id_in_use(national_id_number).await
        }
        async fn list_kyc(&self) -> Result<Vec<KycRecord>, ServiceError> {
            self.inner.list_kyc().await
        }
        async fn replace_kyc_if_unverified(&self, record: &KycRecord) -> Result<bool, ServiceError> {
            self.inner.replace_kyc_if_unverified(record).await
        }
        async fn replace_kyc_if_unchanged(
            &self,
            record: &KycRecord,
            expected_updated_at: chrono::DateTime<Utc>,
        ) -> Result<bool, ServiceError> {
            if !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let mut current = self.inner.find_kyc_by_id(&record.id).await?.unwrap();
                current.complete_self_validation(0.95, "http://api/uploads/selfie.png".into());
                current.updated_at = expected_updated_at + chrono::Duration::milliseconds(5);
                assert!(self.inner.replace_kyc_if_unverified(&current).await?);
            }
            self.inner
                .replace_kyc_if_unchanged(record, expected_updated_at)
                .await
        }
    }

    #[tokio::test]
    async fn admin_review_keeps_a_concurrent_selfie() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let storage = LocalImageStorage::new(dir.path(), "http://api", 5 * 1024 * 1024)
            .await
            .unwrap();
        let racing = Arc::new(InterleavedValidation {
            inner: store.clone(),
            raced: std::sync::atomic::AtomicBool::new(false),
        });
        let service = KycService::new(
            racing,
            store.clone(),
            Arc::new(MockFaceMatcher::matching(0.9)),
            Arc::new(storage),
        );
        let user = seeded_user(&store, "a@x.fr").await;
        let kyc = service.submit(&user.id, submission("ID1")).await.unwrap();

        let reviewed = service
            .admin_review(
                "admin-1",
                AdminReviewRequest {
                    kyc_id: kyc.id.clone(),
                    status: "in_review".into(),
                    rejection_reason: None,
                    selfie_image: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(reviewed.status, KycStatus::InReview);
        assert_eq!(
            reviewed.selfie_image_url.as_deref(),
            Some("http://api/uploads/selfie.png")
        );
        let stored = store.find_kyc_by_id(&kyc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, KycStatus::InReview);
        assert_eq!(
            stored.selfie_image_url.as_deref(),
            Some("http://api/uploads/selfie.png")
        );
    }

    #[tokio::test]
    async fn get_enforces_ownership() {
        let fx = fixture(MockFaceMatcher::matching(0.9)).await;
        let owner = seeded_user(&fx.store, "a@x.fr").await;
        let kyc = fx.service.submit(&owner.id, submission("ID1")).await.unwrap();

        assert!(fx.service.get(&owner.id, false, Some(&kyc.id)).await.is_ok());
        assert!(fx.service.get("admin", true, Some(&kyc.id)).await.is_ok());
        assert!(matches!(
            fx.service.get("stranger", false, Some(&kyc.id)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.get("stranger", false, None).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
