//! Family and event services.

pub mod event_service;
pub mod family_service;

pub use event_service::EventService;
pub use family_service::FamilyService;

use kinnect_database::{membership::find_membership, FamilyMember, ServiceError, ServiceResult};
use sqlx::SqlitePool;

/// The caller's membership, or 403 when they do not belong to the family.
pub(crate) async fn require_member(
    pool: &SqlitePool,
    family_id: &str,
    user_id: &str,
) -> ServiceResult<FamilyMember> {
    find_membership(pool, family_id, user_id)
        .await?
        .ok_or_else(|| ServiceError::forbidden("You are not a member of this family"))
}
