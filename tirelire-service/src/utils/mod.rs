pub mod multipart;
pub mod password;
pub mod slug;
pub mod validation;

pub use multipart::{MultipartForm, UploadedImage};
pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use slug::slugify;
pub use validation::ValidatedJson;
