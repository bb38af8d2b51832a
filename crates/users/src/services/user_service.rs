//! Registration, login and profile management.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use kinnect_auth::{hash_password, verify_password, AuthError, JwtManager};
use kinnect_database::{
    new_id, timestamp, NewUser, ProfileUpdate, ServiceError, ServiceResult, User, UserSummary,
};
use kinnect_media::ObjectStore;

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, bio, \
     profile_picture, date_of_birth, created_at, updated_at";

/// Upper bound on search results regardless of what the caller asks for.
pub const MAX_SEARCH_RESULTS: u32 = 20;

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

/// A user together with a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct UserService {
    pub(crate) pool: SqlitePool,
    pub(crate) jwt: Arc<JwtManager>,
    pub(crate) store: Arc<dyn ObjectStore>,
}

impl UserService {
    pub fn new(pool: SqlitePool, jwt: Arc<JwtManager>, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, jwt, store }
    }

    pub async fn register(&self, input: RegisterInput) -> ServiceResult<AuthenticatedUser> {
        let email = normalize_email(&input.email);
        let username = input
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::bad_request("User already exists with this email"));
        }
        if let Some(username) = &username {
            if self.username_taken(username, None).await? {
                return Err(ServiceError::bad_request("Username is already taken"));
            }
        }

        let password_hash = hash_password(&input.password).map_err(ServiceError::internal)?;
        let user = self
            .insert(NewUser {
                email,
                username,
                password_hash,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
            })
            .await?;

        let token = self.issue_token(&user)?;
        info!(user_id = %user.id, "registered new user");
        Ok(AuthenticatedUser { user, token })
    }

    async fn insert(&self, new_user: NewUser) -> ServiceResult<User> {
        let id = new_id();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, first_name, last_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthenticatedUser> {
        let invalid = || ServiceError::unauthorized("Invalid credentials");

        let user = self
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).map_err(ServiceError::internal)? {
            return Err(invalid());
        }

        let token = self.issue_token(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthenticatedUser { user, token })
    }

    /// Resolve a bearer token to the user it was issued for.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self.jwt.validate_token(token).map_err(|error| match error {
            AuthError::TokenExpired => ServiceError::unauthorized("Token has expired"),
            _ => ServiceError::unauthorized("Invalid token"),
        })?;

        self.find(&claims.sub)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("User not found"))
    }

    fn issue_token(&self, user: &User) -> ServiceResult<String> {
        self.jwt
            .generate_token(&user.id, &user.email)
            .map_err(ServiceError::internal)
    }

    pub async fn find(&self, user_id: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> ServiceResult<User> {
        self.find(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn username_taken(&self, username: &str, except_user: Option<&str>) -> ServiceResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? AND id != COALESCE(?, ''))",
        )
        .bind(username)
        .bind(except_user)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> ServiceResult<User> {
        let existing = self.get(user_id).await?;
        if update.is_empty() {
            return Ok(existing);
        }

        if let Some(username) = update.username.as_deref() {
            if self.username_taken(username, Some(user_id)).await? {
                return Err(ServiceError::bad_request("Username is already taken"));
            }
        }

        sqlx::query(
            "UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                username = COALESCE(?, username),
                bio = COALESCE(?, bio),
                profile_picture = COALESCE(?, profile_picture),
                date_of_birth = COALESCE(?, date_of_birth),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(update.first_name.as_deref().map(str::trim))
        .bind(update.last_name.as_deref().map(str::trim))
        .bind(update.username.as_deref().map(str::trim))
        .bind(update.bio.as_deref())
        .bind(update.profile_picture.as_deref())
        .bind(update.date_of_birth.as_deref())
        .bind(timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!(user_id, "updated profile");
        self.get(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self.get(user_id).await?;
        if !verify_password(current_password, &user.password_hash).map_err(ServiceError::internal)? {
            return Err(ServiceError::unauthorized("Current password is incorrect"));
        }

        let password_hash = hash_password(new_password).map_err(ServiceError::internal)?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(timestamp())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id, "changed password");
        Ok(())
    }

    /// Case-insensitive match on names, username and email.
    pub async fn search(&self, query: &str, limit: u32) -> ServiceResult<Vec<UserSummary>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(&trimmed.to_lowercase()));
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, first_name, last_name, profile_picture FROM users
             WHERE lower(first_name) LIKE ?1 ESCAPE '\\'
                OR lower(last_name) LIKE ?1 ESCAPE '\\'
                OR lower(COALESCE(username, '')) LIKE ?1 ESCAPE '\\'
                OR lower(email) LIKE ?1 ESCAPE '\\'
                OR lower(first_name || ' ' || last_name) LIKE ?1 ESCAPE '\\'
             ORDER BY first_name, last_name
             LIMIT ?2",
        )
        .bind(pattern)
        .bind(i64::from(limit.clamp(1, MAX_SEARCH_RESULTS)))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Mom@Example.COM "), "mom@example.com");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
