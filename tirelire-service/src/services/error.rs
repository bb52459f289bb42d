use service_core::error::AppError;
use thiserror::Error;

/// Coarse classification used when mapping onto HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Forbidden,
    NotFound,
    Conflict,
    Service,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Email ou mot de passe invalide")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Veuillez vérifier votre email avant de vous connecter")]
    EmailNotVerified,

    #[error("Ce compte est désactivé")]
    AccountDisabled,

    #[error("{0}")]
    Forbidden(String),

    #[error("Utilisateur non trouvé")]
    UserNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("Cet email est déjà utilisé")]
    EmailAlreadyRegistered,

    #[error("Cet email est déjà vérifié")]
    EmailAlreadyVerified,

    #[error("Vous avez déjà soumis vos informations KYC")]
    KycAlreadySubmitted,

    #[error("Cette carte nationale d'identité est déjà utilisée")]
    NationalIdInUse,

    #[error("Vous avez déjà vérifié votre identité")]
    FacialVerificationCompleted,

    #[error("Le dossier KYC a été modifié entre-temps, veuillez réessayer")]
    KycModifiedConcurrently,

    #[error("Un groupe avec ce nom existe déjà")]
    SlugTaken,

    #[error("Token invalide ou expiré")]
    InvalidToken,

    #[error("Les mots de passe ne correspondent pas")]
    PasswordMismatch,

    #[error("L'image ne correspond pas à la carte nationale d'identité")]
    FaceMismatch,

    #[error("Face match scorer error: {0}")]
    Scorer(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_)
            | ServiceError::InvalidToken
            | ServiceError::PasswordMismatch
            | ServiceError::FaceMismatch => ErrorKind::Validation,
            ServiceError::InvalidCredentials | ServiceError::Unauthorized(_) => ErrorKind::Auth,
            ServiceError::EmailNotVerified
            | ServiceError::AccountDisabled
            | ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::UserNotFound | ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::EmailAlreadyRegistered
            | ServiceError::EmailAlreadyVerified
            | ServiceError::KycAlreadySubmitted
            | ServiceError::NationalIdInUse
            | ServiceError::FacialVerificationCompleted
            | ServiceError::KycModifiedConcurrently
            | ServiceError::SlugTaken => ErrorKind::Conflict,
            ServiceError::Database(_)
            | ServiceError::Internal(_)
            | ServiceError::Scorer(_)
            | ServiceError::Email(_)
            | ServiceError::Storage(_) => ErrorKind::Service,
        }
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::EmailError(msg) => ServiceError::Email(msg),
            other => ServiceError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Email(e) => AppError::EmailError(e),
            ServiceError::Scorer(_) | ServiceError::Storage(_) => {
                AppError::InternalError(anyhow::anyhow!(message))
            }
            other => match other.kind() {
                ErrorKind::Validation => AppError::BadRequest(anyhow::anyhow!(message)),
                ErrorKind::Auth => AppError::AuthError(anyhow::anyhow!(message)),
                ErrorKind::Forbidden => AppError::Forbidden(anyhow::anyhow!(message)),
                ErrorKind::NotFound => AppError::NotFound(anyhow::anyhow!(message)),
                ErrorKind::Conflict => AppError::Conflict(anyhow::anyhow!(message)),
                ErrorKind::Service => AppError::InternalError(anyhow::anyhow!(message)),
            },
        }
    }
}
