//! Repository for families.

use sqlx::SqlitePool;
use tracing::debug;

use super::{encode_json, MemberRepository};
use crate::entities::{Family, FamilySettings, MemberRole, MembershipSummary};
use crate::graph::delete_family_graph;
use crate::types::ServiceResult;
use crate::timestamp;

const FAMILY_COLUMNS: &str = "id, name, description, settings, created_by, created_at, updated_at";

/// Fields of a family that may change after creation. `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub settings: Option<&'a FamilySettings>,
}

#[derive(Debug, Clone)]
pub struct FamilyRepository {
    pool: SqlitePool,
}

impl FamilyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, family_id: &str) -> ServiceResult<Option<Family>> {
        let family = sqlx::query_as::<_, Family>(&format!(
            "SELECT {FAMILY_COLUMNS} FROM families WHERE id = ?"
        ))
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(family)
    }

    /// Families the user belongs to, by name, with their role and head count.
    pub async fn find_for_user(&self, user_id: &str) -> ServiceResult<Vec<MembershipSummary>> {
        let families = sqlx::query_as::<_, MembershipSummary>(
            "SELECT f.id, f.name, f.description, f.settings, f.created_by, f.created_at, f.updated_at,
                    fm.role,
                    (SELECT COUNT(*) FROM family_members c WHERE c.family_id = f.id) AS member_count
             FROM families f
             JOIN family_members fm ON fm.family_id = f.id
             WHERE fm.user_id = ?
             ORDER BY f.name, f.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(families)
    }

    /// Store a new family and make its creator the first admin.
    pub async fn create(&self, family: &Family) -> ServiceResult<()> {
        let settings = encode_json(&family.settings)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO families (id, name, description, settings, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&family.id)
        .bind(&family.name)
        .bind(&family.description)
        .bind(&settings)
        .bind(&family.created_by)
        .bind(&family.created_at)
        .bind(&family.updated_at)
        .execute(&mut *tx)
        .await?;

        MemberRepository::insert(&mut tx, &family.id, &family.created_by, MemberRole::Admin).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn update(&self, family_id: &str, changes: FamilyChanges<'_>) -> ServiceResult<()> {
        let settings = changes.settings.map(encode_json).transpose()?;
        sqlx::query(
            "UPDATE families SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                settings = COALESCE(?, settings),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(changes.name)
        .bind(changes.description)
        .bind(settings)
        .bind(timestamp())
        .bind(family_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove the family with its events, post tags and memberships.
    pub async fn delete(&self, family_id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        delete_family_graph(&mut tx, family_id).await?;
        tx.commit().await?;
        debug!(family_id, "family removed");
        Ok(())
    }
}
