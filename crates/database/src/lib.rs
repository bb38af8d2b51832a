//! Kinnect Database Crate
//!
//! Connection management, embedded migrations, the entity types shared by the
//! service crates, repositories for families and posts, and the transactional
//! helpers that remove whole entity graphs.

use sqlx::SqlitePool;

use kinnect_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod graph;
pub mod membership;
pub mod migrations;
pub mod repos;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{FamilyRepository, MemberRepository, PostRepository};

pub use entities::*;

pub use types::{DatabaseError, DatabaseResult, ServiceError, ServiceResult};

/// Open the pool and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Fresh public identifier for a new row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time in the RFC 3339 form stored in every timestamp column.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Whether `value` is a well-formed row identifier.
pub fn is_valid_id(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}
