//! Membership lookups used by every service that authorizes against a family.

use sqlx::{Executor, Sqlite};

use crate::entities::{FamilyMember, MemberRole};

pub async fn find_membership<'e, E>(
    executor: E,
    family_id: &str,
    user_id: &str,
) -> Result<Option<FamilyMember>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, FamilyMember>(
        "SELECT id, family_id, user_id, role, permissions, joined_at
         FROM family_members WHERE family_id = ? AND user_id = ?",
    )
    .bind(family_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn admin_count<'e, E>(executor: E, family_id: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM family_members WHERE family_id = ? AND role = ?")
        .bind(family_id)
        .bind(MemberRole::Admin)
        .fetch_one(executor)
        .await
}

pub async fn family_ids_for_user<'e, E>(
    executor: E,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT family_id FROM family_members WHERE user_id = ? ORDER BY joined_at")
        .bind(user_id)
        .fetch_all(executor)
        .await
}
