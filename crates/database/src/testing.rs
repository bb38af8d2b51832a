//! Fixtures for tests that need a migrated database.

use kinnect_config::DatabaseConfig;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::entities::{MemberPermissions, MemberRole};
use crate::{initialize_database, new_id, timestamp};

/// A migrated database in a fresh temporary directory. Keep the `TempDir` alive.
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("kinnect-test.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 4,
    };

    let pool = initialize_database(&config)
        .await
        .expect("failed to initialise test database");
    (pool, temp_dir)
}

/// Insert a user with a placeholder password hash and return its id.
pub async fn insert_user(pool: &SqlitePool, email: &str) -> String {
    let id = new_id();
    let now = timestamp();
    let first_name = email.split('@').next().unwrap_or("user");
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, created_at, updated_at)
         VALUES (?, ?, 'not-a-real-hash', ?, 'Test', ?, ?)",
    )
    .bind(&id)
    .bind(email)
    .bind(first_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("failed to insert test user");
    id
}

/// Insert a family owned by `owner_id`, who becomes its admin, and return its id.
pub async fn insert_family(pool: &SqlitePool, owner_id: &str, name: &str) -> String {
    let id = new_id();
    let now = timestamp();
    sqlx::query(
        "INSERT INTO families (id, name, settings, created_by, created_at, updated_at)
         VALUES (?, ?, '{}', ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(owner_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("failed to insert test family");

    add_member(pool, &id, owner_id, MemberRole::Admin).await;
    id
}

pub async fn add_member(pool: &SqlitePool, family_id: &str, user_id: &str, role: MemberRole) {
    let permissions = serde_json::to_string(&MemberPermissions::for_role(role))
        .expect("permissions serialize");
    sqlx::query(
        "INSERT INTO family_members (id, family_id, user_id, role, permissions, joined_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new_id())
    .bind(family_id)
    .bind(user_id)
    .bind(role)
    .bind(permissions)
    .bind(timestamp())
    .execute(pool)
    .await
    .expect("failed to insert test membership");
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("failed to count rows")
}
