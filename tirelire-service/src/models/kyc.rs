//! Identity verification cases.
//!
//! A user owns at most one [`KycRecord`]. It starts `pending`, and moves either
//! through facial self-validation (scored by the external matcher) or through
//! an admin decision. The personal fields never change after creation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::InReview => "in_review",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for KycStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(KycStatus::Pending),
            "in_review" => Ok(KycStatus::InReview),
            "approved" => Ok(KycStatus::Approved),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(format!("Statut KYC invalide: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    Ai,
    Human,
}

/// Who made the last decision. `user` is set only for human reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewedBy {
    pub source: ReviewSource,
    pub user: Option<String>,
}

impl ReviewedBy {
    pub fn ai() -> Self {
        Self {
            source: ReviewSource::Ai,
            user: None,
        }
    }

    pub fn human(admin_id: &str) -> Self {
        Self {
            source: ReviewSource::Human,
            user: Some(admin_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub address: Address,
    pub national_id_number: String,
}

/// Outcome of an admin review, parsed from the raw status and reason.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
    MarkInReview,
    Reopen,
}

impl ReviewDecision {
    pub fn parse(status: &str, reason: Option<&str>) -> Result<Self, String> {
        let status: KycStatus = status.parse()?;
        Ok(match status {
            KycStatus::Approved => ReviewDecision::Approve,
            KycStatus::InReview => ReviewDecision::MarkInReview,
            KycStatus::Pending => ReviewDecision::Reopen,
            KycStatus::Rejected => {
                let reason = reason.map(str::trim).unwrap_or_default();
                if reason.is_empty() {
                    return Err("Un motif de rejet est requis".to_string());
                }
                ReviewDecision::Reject {
                    reason: reason.to_string(),
                }
            }
        })
    }

    pub fn status(&self) -> KycStatus {
        match self {
            ReviewDecision::Approve => KycStatus::Approved,
            ReviewDecision::Reject { .. } => KycStatus::Rejected,
            ReviewDecision::MarkInReview => KycStatus::InReview,
            ReviewDecision::Reopen => KycStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub address: Address,
    pub national_id_number: String,
    pub national_id_image_url: String,
    pub selfie_image_url: Option<String>,
    pub facial_verification_completed: bool,
    pub facial_verification_score: Option<f64>,
    pub status: KycStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<ReviewedBy>,
    pub reviewed_at: Option<mongodb::bson::DateTime>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Score recorded for human decisions.
pub const HUMAN_REVIEW_SCORE: f64 = 1.0;

impl KycRecord {
    pub fn new(user_id: String, details: PersonalDetails, national_id_image_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            first_name: details.first_name,
            last_name: details.last_name,
            birth_date: details.birth_date,
            address: details.address,
            national_id_number: details.national_id_number,
            national_id_image_url,
            selfie_image_url: None,
            facial_verification_completed: false,
            facial_verification_score: None,
            status: KycStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a positive facial match.
    pub fn complete_self_validation(&mut self, score: f64, selfie_image_url: String) {
        let now = Utc::now();
        self.facial_verification_completed = true;
        self.facial_verification_score = Some(score);
        self.selfie_image_url = Some(selfie_image_url);
        self.status = KycStatus::Approved;
        self.rejection_reason = None;
        self.reviewed_by = Some(ReviewedBy::ai());
        self.reviewed_at = Some(now.into());
        self.updated_at = now;
    }

    /// Apply an admin decision. The status is assigned exactly once.
    pub fn apply_review(
        &mut self,
        decision: ReviewDecision,
        admin_id: &str,
        selfie_image_url: Option<String>,
    ) {
        let now = Utc::now();
        self.status = decision.status();

        match decision {
            ReviewDecision::Reopen => {
                self.facial_verification_completed = false;
                self.facial_verification_score = None;
                self.rejection_reason = None;
            }
            ReviewDecision::Reject { reason } => {
                self.facial_verification_completed = true;
                self.facial_verification_score = Some(HUMAN_REVIEW_SCORE);
                self.rejection_reason = Some(reason);
            }
            ReviewDecision::Approve | ReviewDecision::MarkInReview => {
                self.facial_verification_completed = true;
                self.facial_verification_score = Some(HUMAN_REVIEW_SCORE);
                self.rejection_reason = None;
            }
        }

        if let Some(url) = selfie_image_url {
            self.selfie_image_url = Some(url);
        }
        self.reviewed_by = Some(ReviewedBy::human(admin_id));
        self.reviewed_at = Some(now.into());
        self.updated_at = now;
    }
}

/// API view of a [`KycRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KycResponse {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, format = Date)]
    pub birth_date: NaiveDate,
    pub address: Address,
    pub national_id_number: String,
    pub national_id_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selfie_image_url: Option<String>,
    pub facial_verification_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facial_verification_score: Option<f64>,
    pub status: KycStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<ReviewedBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<KycRecord> for KycResponse {
    fn from(record: KycRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            first_name: record.first_name,
            last_name: record.last_name,
            birth_date: record.birth_date,
            address: record.address,
            national_id_number: record.national_id_number,
            national_id_image_url: record.national_id_image_url,
            selfie_image_url: record.selfie_image_url,
            facial_verification_completed: record.facial_verification_completed,
            facial_verification_score: record.facial_verification_score,
            status: record.status,
            rejection_reason: record.rejection_reason,
            reviewed_by: record.reviewed_by,
            reviewed_at: record.reviewed_at.map(|dt| dt.to_chrono()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
