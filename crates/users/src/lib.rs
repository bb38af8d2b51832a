//! # Kinnect Users Crate
//!
//! Account lifecycle for the Kinnect backend: registration and login with
//! bearer tokens, profile edits, password changes, user search and the
//! transactional removal of an account with everything it owns.
//!
//! ```rust,ignore
//! use kinnect_users::{RegisterInput, UserService};
//!
//! let service = UserService::new(pool, jwt, store);
//! let registered = service.register(input).await?;
//! ```

pub mod services;

pub use services::{
    AuthenticatedUser, DeletionReport, RegisterInput, UserService, MAX_SEARCH_RESULTS,
};
