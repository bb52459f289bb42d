use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
}

impl TokenType {
    /// Value of the `purpose` claim carried by tokens of this type.
    pub fn purpose(&self) -> &'static str {
        match self {
            TokenType::EmailVerification => "email_verification",
            TokenType::PasswordReset => "password_reset",
        }
    }
}

/// Stored half of a single-use token. The user receives a signed JWT that
/// embeds `nonce` and `email`; redeeming it deletes this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    #[serde(rename = "_id")]
    pub nonce: String,
    pub email: String,
    pub token_type: TokenType,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(token_type: TokenType, nonce: String, email: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            nonce,
            email,
            token_type,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
