//! Credential primitives for the Kinnect backend: argon2 password hashing and
//! HS256 bearer tokens.

pub mod jwt;
pub mod password;

use thiserror::Error;

pub use jwt::{Claims, JwtManager};
pub use password::{hash_password, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] argon2::password_hash::Error),

    #[error("token creation failed: {0}")]
    TokenCreation(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,
}

pub type AuthResult<T> = Result<T, AuthError>;
