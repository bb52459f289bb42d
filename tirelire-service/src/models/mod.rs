pub mod group;
pub mod kyc;
pub mod user;
pub mod verification_token;

pub use group::{Group, GroupResponse};
pub use kyc::{
    Address, KycRecord, KycResponse, KycStatus, PersonalDetails, ReviewDecision, ReviewSource,
    ReviewedBy,
};
pub use user::{normalize_email, Role, SanitizedUser, User, USER_UPDATED_AT};
pub use verification_token::{TokenType, VerificationToken};
