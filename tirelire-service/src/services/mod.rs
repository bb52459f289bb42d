//! Workflows and their collaborators.
//!
//! The auth, KYC and group workflows talk to persistence through the
//! repository traits, and to mail, the face-match scorer and upload storage
//! through their own traits, so tests can swap in-process doubles.

mod auth;
mod database;
pub mod email;
pub mod error;
pub mod face_match;
mod group;
mod jwt;
mod kyc;
mod memory;
pub mod metrics;
pub mod repository;
pub mod storage;

pub use auth::{AuthService, AuthSettings};
pub use database::MongoDb;
pub use email::{EmailProvider, EmailService, MockEmailService};
pub use error::{ErrorKind, ServiceError};
pub use face_match::{FaceMatch, FaceMatcher, HttpFaceMatcher, MockFaceMatcher};
pub use group::GroupService;
pub use jwt::{JwtService, SessionClaims, SingleUseClaims};
pub use kyc::KycService;
pub use memory::InMemoryStore;
pub use repository::{Datastore, GroupRepository, KycRepository, TokenRepository, UserRepository};
pub use storage::{ImageStorage, LocalImageStorage, StoredImage};
