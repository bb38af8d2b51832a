//! Families and their membership.

use sqlx::SqlitePool;
use tracing::info;

use kinnect_database::membership::{self, admin_count};
use kinnect_database::repos::FamilyChanges;
use kinnect_database::{
    new_id, timestamp, Family, FamilyMember, FamilyRepository, MemberDetails, MemberPermissions,
    MemberRepository, MemberRole, MembershipSummary, ServiceError, ServiceResult,
};

use super::require_member;
use crate::types::{FamilyDetails, FamilyUpdate, MemberTarget, MemberUpdate, NewFamily, NewMember};

const LAST_ADMIN: &str = "Family must have at least one admin";

#[derive(Clone)]
pub struct FamilyService {
    pool: SqlitePool,
    family_repository: FamilyRepository,
    member_repository: MemberRepository,
}

impl FamilyService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            family_repository: FamilyRepository::new(pool.clone()),
            member_repository: MemberRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a family with the caller as its first admin.
    pub async fn create(&self, user_id: &str, input: NewFamily) -> ServiceResult<Family> {
        let now = timestamp();
        let family = Family {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            settings: input.settings.unwrap_or_default(),
            created_by: user_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.family_repository.create(&family).await?;

        info!(family_id = %family.id, user_id, "created family");
        Ok(family)
    }

    /// Families the user belongs to, with their role in each.
    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<MembershipSummary>> {
        self.family_repository.find_for_user(user_id).await
    }

    pub async fn get(&self, family_id: &str, user_id: &str) -> ServiceResult<FamilyDetails> {
        let family = self.load(family_id).await?;
        require_member(&self.pool, family_id, user_id).await?;

        let members = self.members(family_id).await?;
        Ok(FamilyDetails { family, members })
    }

    pub async fn update(
        &self,
        family_id: &str,
        user_id: &str,
        update: FamilyUpdate,
    ) -> ServiceResult<Family> {
        self.load(family_id).await?;
        self.require_admin(family_id, user_id).await?;

        self.family_repository
            .update(
                family_id,
                FamilyChanges {
                    name: update.name.as_deref().map(str::trim),
                    description: update.description.as_deref(),
                    settings: update.settings.as_ref(),
                },
            )
            .await?;

        info!(family_id, user_id, "updated family");
        self.load(family_id).await
    }

    /// Only the creator may delete; everything hanging off the family goes with it.
    pub async fn delete(&self, family_id: &str, user_id: &str) -> ServiceResult<()> {
        let family = self.load(family_id).await?;
        if family.created_by != user_id {
            return Err(ServiceError::forbidden("Only the family creator can delete the family"));
        }

        self.family_repository.delete(family_id).await?;

        info!(family_id, user_id, "deleted family");
        Ok(())
    }

    pub async fn list_members(&self, family_id: &str, user_id: &str) -> ServiceResult<Vec<MemberDetails>> {
        self.load(family_id).await?;
        require_member(&self.pool, family_id, user_id).await?;
        self.members(family_id).await
    }

    /// Add a user by id or email. Inviting needs `canInvite` (or the family
    /// setting that opens invites to everyone); granting admin needs admin.
    pub async fn add_member(
        &self,
        family_id: &str,
        actor_id: &str,
        input: NewMember,
    ) -> ServiceResult<MemberDetails> {
        let family = self.load(family_id).await?;
        let actor = require_member(&self.pool, family_id, actor_id).await?;

        if !actor.can(|p| p.can_invite) && !family.settings.allow_member_invites {
            return Err(ServiceError::forbidden("You do not have permission to add members"));
        }

        let role = input.role.unwrap_or(MemberRole::Member);
        if role.is_admin() && !actor.is_admin() {
            return Err(ServiceError::forbidden("Only admins can add other admins"));
        }

        let user_id = self.resolve_target(&input.target).await?;
        if self.member_repository.find(family_id, &user_id).await?.is_some() {
            return Err(ServiceError::bad_request("User is already a member of this family"));
        }

        self.member_repository.add(family_id, &user_id, role).await?;

        info!(family_id, user_id = %user_id, added_by = actor_id, %role, "added family member");
        self.member_details(family_id, &user_id).await
    }

    /// Change a member's role or permissions. Admins only.
    pub async fn update_member(
        &self,
        family_id: &str,
        actor_id: &str,
        target_user_id: &str,
        update: MemberUpdate,
    ) -> ServiceResult<MemberDetails> {
        self.load(family_id).await?;
        self.require_admin(family_id, actor_id).await?;

        let mut tx = self.pool.begin().await?;
        let target = membership::find_membership(&mut *tx, family_id, target_user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member"))?;

        let role = update.role.unwrap_or(target.role);
        if target.is_admin() && !role.is_admin() && admin_count(&mut *tx, family_id).await? <= 1 {
            return Err(ServiceError::bad_request(LAST_ADMIN));
        }

        let permissions = match update.permissions {
            Some(permissions) => permissions,
            None if role != target.role => MemberPermissions::for_role(role),
            None => target.permissions,
        };

        MemberRepository::update_role(&mut tx, &target.id, role, &permissions).await?;
        tx.commit().await?;

        info!(family_id, user_id = target_user_id, updated_by = actor_id, %role, "updated family member");
        self.member_details(family_id, target_user_id).await
    }

    /// Admins may remove anyone, members may remove themselves. The creator
    /// and the last admin always stay.
    pub async fn remove_member(
        &self,
        family_id: &str,
        actor_id: &str,
        target_user_id: &str,
    ) -> ServiceResult<()> {
        let family = self.load(family_id).await?;
        let actor = require_member(&self.pool, family_id, actor_id).await?;

        if actor_id != target_user_id && !actor.is_admin() {
            return Err(ServiceError::forbidden("Only admins can remove other members"));
        }
        if family.created_by == target_user_id {
            return Err(ServiceError::bad_request("Cannot remove the family creator"));
        }

        let mut tx = self.pool.begin().await?;
        let target = membership::find_membership(&mut *tx, family_id, target_user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member"))?;

        if target.is_admin() && admin_count(&mut *tx, family_id).await? <= 1 {
            return Err(ServiceError::bad_request(LAST_ADMIN));
        }

        MemberRepository::remove(&mut tx, &target.id).await?;
        tx.commit().await?;

        info!(family_id, user_id = target_user_id, removed_by = actor_id, "removed family member");
        Ok(())
    }

    async fn load(&self, family_id: &str) -> ServiceResult<Family> {
        self.family_repository
            .find_by_id(family_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Family"))
    }

    async fn require_admin(&self, family_id: &str, user_id: &str) -> ServiceResult<FamilyMember> {
        let member = require_member(&self.pool, family_id, user_id).await?;
        if !member.is_admin() {
            return Err(ServiceError::forbidden("Only family admins can do this"));
        }
        Ok(member)
    }

    async fn members(&self, family_id: &str) -> ServiceResult<Vec<MemberDetails>> {
        self.member_repository.list_details(family_id).await
    }

    async fn member_details(&self, family_id: &str, user_id: &str) -> ServiceResult<MemberDetails> {
        self.member_repository
            .find_details(family_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member"))
    }

    async fn resolve_target(&self, target: &MemberTarget) -> ServiceResult<String> {
        let found = match target {
            MemberTarget::UserId(id) => self.member_repository.find_user_by_id(id).await?,
            MemberTarget::Email(email) => self.member_repository.find_user_by_email(email).await?,
        };
        found.ok_or_else(|| ServiceError::not_found("User"))
    }
}
