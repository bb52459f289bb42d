pub mod password;
pub mod registration;
pub mod session;

pub use password::{request_password_reset, reset_password};
pub use registration::{register, request_email_validation, verify_email};
pub use session::login;
