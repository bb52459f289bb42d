use chrono::Duration;
use rand::Rng;
use std::sync::Arc;

use super::metrics::{record_auth_event, record_mail_dispatch};
use super::repository::{TokenRepository, UserRepository};
use super::{EmailProvider, JwtService, ServiceError};
use crate::dtos::auth::{
    AuthResponse, LoginRequest, RegisterRequest, RegisterResponse, ResetPasswordRequest,
};
use crate::models::{normalize_email, TokenType, User, VerificationToken};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

const NAME_MAX_CHARS: usize = 50;

/// Lifetimes and link base for single-use tokens.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub frontend_url: String,
    pub email_token_ttl: Duration,
    pub reset_token_ttl: Duration,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    email: Arc<dyn EmailProvider>,
    jwt: JwtService,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        email: Arc<dyn EmailProvider>,
        jwt: JwtService,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            email,
            jwt,
            settings,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        if req.password != req.confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }
        let first_name = required_name(&req.first_name, "Le prénom")?;
        let last_name = required_name(&req.last_name, "Le nom")?;

        let email = normalize_email(&req.email);
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(&Password::new(req.password))?;

        let mut user = User::new(email, password_hash.into_string(), first_name, last_name);
        user.phone = req
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        // The unique index still catches a concurrent duplicate.
        self.users.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");
        record_auth_event("register", "success");

        let mail_dispatched = match self.send_verification(&user.email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Verification email not dispatched");
                false
            }
        };

        Ok(RegisterResponse {
            user: user.sanitized(),
            mail_dispatched,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let mut user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| {
                record_auth_event("login", "unknown_email");
                ServiceError::NotFound("Email ou mot de passe invalide".to_string())
            })?;

        if !user.email_verified {
            record_auth_event("login", "unverified");
            return Err(ServiceError::EmailNotVerified);
        }
        if !user.is_active {
            record_auth_event("login", "disabled");
            return Err(ServiceError::AccountDisabled);
        }

        // Imported accounts carry no argon2 hash until their first reset.
        if user.password_hash.is_empty() {
            tracing::warn!(user_id = %user.id, "Login failed: no password hash on record");
            record_auth_event("login", "no_credential");
            return Err(ServiceError::InvalidCredentials);
        }

        let hash = PasswordHashString::new(user.password_hash.clone());
        if !verify_password(&Password::new(req.password), &hash)? {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            record_auth_event("login", "bad_password");
            return Err(ServiceError::InvalidCredentials);
        }

        self.users.record_login(&user.id).await?;
        user.last_login_at = Some(chrono::Utc::now().into());

        tracing::info!(user_id = %user.id, "User logged in");
        record_auth_event("login", "success");
        self.session_for(&user)
    }

    pub async fn verify_email(&self, token: &str) -> Result<AuthResponse, ServiceError> {
        let claims = self
            .jwt
            .decode_single_use_token(TokenType::EmailVerification, token)?;

        self.tokens
            .redeem_token(TokenType::EmailVerification, &claims.nonce, &claims.email)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let user = self
            .users
            .mark_email_verified(&claims.email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        tracing::info!(user_id = %user.id, "Email verified");
        record_auth_event("verify_email", "success");
        self.session_for(&user)
    }

    /// Re-send a verification link. Delivery is the whole point, so a mail
    /// failure is returned to the caller.
    pub async fn request_email_validation(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if user.email_verified {
            return Err(ServiceError::EmailAlreadyVerified);
        }

        self.send_verification(&user.email).await
    }

    /// Always succeeds for unknown addresses so accounts cannot be enumerated.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        if let Err(e) = self.send_password_reset(&user.email).await {
            tracing::warn!(user_id = %user.id, error = %e, "Password reset email not dispatched");
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<AuthResponse, ServiceError> {
        if req.password != req.confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }
        if req.password.chars().count() < crate::utils::password::MIN_PASSWORD_LENGTH {
            return Err(ServiceError::Validation(
                "Le mot de passe doit contenir au moins 6 caractères".to_string(),
            ));
        }

        let claims = self
            .jwt
            .decode_single_use_token(TokenType::PasswordReset, &req.token)?;

        self.tokens
            .redeem_token(TokenType::PasswordReset, &claims.nonce, &claims.email)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let password_hash = hash_password(&Password::new(req.password))?;
        let user = self
            .users
            .update_password(&claims.email, password_hash.as_str())
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        tracing::info!(user_id = %user.id, "Password reset");
        // Same gate as login: no session for a disabled account.
        if !user.is_active {
            return Err(ServiceError::AccountDisabled);
        }
        record_auth_event("reset_password", "success");
        self.session_for(&user)
    }

    /// Resolve a bearer token to an active user.
    pub async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let claims = self.jwt.validate_session_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            ServiceError::Unauthorized("Token invalide ou expiré".to_string())
        })?;

        match self.users.find_user_by_id(&claims.sub).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(ServiceError::Unauthorized(
                "Utilisateur non trouvé ou désactivé".to_string(),
            )),
        }
    }

    fn session_for(&self, user: &User) -> Result<AuthResponse, ServiceError> {
        Ok(AuthResponse {
            user: user.sanitized(),
            token: self.jwt.issue_session_token(user)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    async fn issue_token(
        &self,
        token_type: TokenType,
        email: &str,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let nonce = generate_nonce();
        let record = VerificationToken::new(token_type, nonce.clone(), email.to_string(), ttl);
        self.tokens.insert_token(&record).await?;
        self.jwt.issue_single_use_token(token_type, email, &nonce, ttl)
    }

    async fn send_verification(&self, email: &str) -> Result<(), ServiceError> {
        let token = self
            .issue_token(TokenType::EmailVerification, email, self.settings.email_token_ttl)
            .await?;
        let result = self
            .email
            .send_verification_email(email, &token, &self.settings.frontend_url)
            .await;
        record_mail_dispatch("verification", result.is_ok());
        result.map_err(ServiceError::from)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let token = self
            .issue_token(TokenType::PasswordReset, email, self.settings.reset_token_ttl)
            .await?;
        let result = self
            .email
            .send_password_reset_email(email, &token, &self.settings.frontend_url)
            .await;
        record_mail_dispatch("password_reset", result.is_ok());
        result.map_err(ServiceError::from)
    }
}

fn required_name(value: &str, label: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(ServiceError::Validation(format!(
            "{} doit contenir entre 1 et {} caractères",
            label, NAME_MAX_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// 32 random bytes, hex encoded.
fn generate_nonce() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
