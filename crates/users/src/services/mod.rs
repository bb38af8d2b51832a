//! Account services: registration, credentials, profiles and deletion.

pub mod account_deletion;
pub mod user_service;

pub use account_deletion::DeletionReport;
pub use user_service::{AuthenticatedUser, RegisterInput, UserService, MAX_SEARCH_RESULTS};
