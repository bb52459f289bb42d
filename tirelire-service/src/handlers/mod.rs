pub mod auth;
pub mod group;
pub mod kyc;
pub mod metrics;
