//! Repository for family membership records.

use sqlx::{SqliteConnection, SqlitePool};

use super::encode_json;
use crate::entities::{FamilyMember, MemberDetails, MemberPermissions, MemberRole};
use crate::membership::find_membership;
use crate::types::ServiceResult;
use crate::{new_id, timestamp};

const MEMBER_DETAILS_QUERY: &str =
    "SELECT fm.id, fm.family_id, fm.user_id, fm.role, fm.permissions, fm.joined_at,
            u.username, u.first_name, u.last_name, u.profile_picture
     FROM family_members fm
     JOIN users u ON u.id = fm.user_id";

#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, family_id: &str, user_id: &str) -> ServiceResult<Option<FamilyMember>> {
        Ok(find_membership(&self.pool, family_id, user_id).await?)
    }

    /// A member joined with their public profile.
    pub async fn find_details(
        &self,
        family_id: &str,
        user_id: &str,
    ) -> ServiceResult<Option<MemberDetails>> {
        let member = sqlx::query_as::<_, MemberDetails>(&format!(
            "{MEMBER_DETAILS_QUERY} WHERE fm.family_id = ? AND fm.user_id = ?"
        ))
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    /// Every member of a family, longest-standing first.
    pub async fn list_details(&self, family_id: &str) -> ServiceResult<Vec<MemberDetails>> {
        let members = sqlx::query_as::<_, MemberDetails>(&format!(
            "{MEMBER_DETAILS_QUERY} WHERE fm.family_id = ? ORDER BY fm.joined_at, fm.id"
        ))
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Id of the user with this id, if the account exists.
    pub async fn find_user_by_id(&self, user_id: &str) -> ServiceResult<Option<String>> {
        let found = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    /// Id of the user registered under `email`, compared case-insensitively.
    pub async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<String>> {
        let found = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    pub async fn add(&self, family_id: &str, user_id: &str, role: MemberRole) -> ServiceResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, family_id, user_id, role).await
    }

    /// Insert a membership with the default permissions of `role`.
    pub async fn insert(
        conn: &mut SqliteConnection,
        family_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> ServiceResult<()> {
        let permissions = encode_json(&MemberPermissions::for_role(role))?;
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
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_role(
        conn: &mut SqliteConnection,
        member_id: &str,
        role: MemberRole,
        permissions: &MemberPermissions,
    ) -> ServiceResult<()> {
        sqlx::query("UPDATE family_members SET role = ?, permissions = ? WHERE id = ?")
            .bind(role)
            .bind(encode_json(permissions)?)
            .bind(member_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn remove(conn: &mut SqliteConnection, member_id: &str) -> ServiceResult<()> {
        sqlx::query("DELETE FROM family_members WHERE id = ?")
            .bind(member_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{insert_family, insert_user, test_pool};

    #[tokio::test]
    async fn added_members_get_their_role_defaults() {
        let (pool, _dir) = test_pool().await;
        let owner = insert_user(&pool, "owner@example.com").await;
        let joiner = insert_user(&pool, "joiner@example.com").await;
        let family = insert_family(&pool, &owner, "Smiths").await;
        let repo = MemberRepository::new(pool);

        repo.add(&family, &joiner, MemberRole::Member).await.unwrap();

        let member = repo.find(&family, &joiner).await.unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Member);
        assert_eq!(member.permissions, MemberPermissions::for_role(MemberRole::Member));

        let listed = repo.list_details(&family).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.member.user_id.as_str()).collect();
        assert_eq!(ids, [owner.as_str(), joiner.as_str()]);
    }

    #[tokio::test]
    async fn users_are_found_by_id_or_email() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "someone@example.com").await;
        let repo = MemberRepository::new(pool);

        assert_eq!(repo.find_user_by_id(&user).await.unwrap().as_deref(), Some(user.as_str()));
        assert_eq!(
            repo.find_user_by_email(" SomeOne@Example.com ").await.unwrap().as_deref(),
            Some(user.as_str())
        );
        assert!(repo.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
