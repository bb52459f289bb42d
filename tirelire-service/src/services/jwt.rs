use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use super::ServiceError;
use crate::config::JwtConfig;
use crate::models::{Role, TokenType, User};

/// Signs and verifies session tokens and single-use email tokens.
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims carried by bearer session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Claims of email-verification and password-reset tokens. `nonce` keys the
/// stored record; `purpose` keeps one kind from being replayed as the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleUseClaims {
    pub email: String,
    pub nonce: String,
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
}

impl JwtService {
    /// RS256 when both PEM paths are configured, HS256 with the shared secret otherwise.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let (algorithm, encoding_key, decoding_key) =
            match (&config.private_key_path, &config.public_key_path) {
                (Some(private_path), Some(public_path)) => {
                    let private_pem = fs::read_to_string(private_path).map_err(|e| {
                        anyhow::anyhow!("Failed to read private key from {}: {}", private_path, e)
                    })?;
                    let public_pem = fs::read_to_string(public_path).map_err(|e| {
                        anyhow::anyhow!("Failed to read public key from {}: {}", public_path, e)
                    })?;

                    let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
                        .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;
                    let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
                        .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

                    tracing::info!("JWT service initialized with RS256 keys");
                    (Algorithm::RS256, encoding_key, decoding_key)
                }
                _ => {
                    let secret = config
                        .secret
                        .as_deref()
                        .ok_or_else(|| anyhow::anyhow!("JWT_SECRET is not set"))?;

                    tracing::info!("JWT service initialized with HS256 secret");
                    (
                        Algorithm::HS256,
                        EncodingKey::from_secret(secret.as_bytes()),
                        DecodingKey::from_secret(secret.as_bytes()),
                    )
                }
            };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        })
    }

    pub fn issue_session_token(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode session token: {}", e)))
    }

    /// Verifies signature and expiry before returning any claim.
    pub fn validate_session_token(&self, token: &str) -> Result<SessionClaims, anyhow::Error> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| anyhow::anyhow!("Invalid session token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn issue_single_use_token(
        &self,
        token_type: TokenType,
        email: &str,
        nonce: &str,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = SingleUseClaims {
            email: email.to_string(),
            nonce: nonce.to_string(),
            purpose: token_type.purpose().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Any signature, expiry or purpose failure is reported as `InvalidToken`.
    pub fn decode_single_use_token(
        &self,
        token_type: TokenType,
        token: &str,
    ) -> Result<SingleUseClaims, ServiceError> {
        let claims = decode::<SingleUseClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected single-use token");
                ServiceError::InvalidToken
            })?
            .claims;

        if claims.purpose != token_type.purpose() {
            tracing::debug!(purpose = %claims.purpose, "Single-use token used for the wrong purpose");
            return Err(ServiceError::InvalidToken);
        }

        Ok(claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }
}
