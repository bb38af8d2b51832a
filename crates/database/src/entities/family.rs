//! Family and membership entity definitions

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use super::{decode_json, user::UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(MemberRole::Admin),
            "member" => Some(MemberRole::Member),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-member capability flags stored as JSON next to the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberPermissions {
    pub can_post: bool,
    pub can_create_events: bool,
    pub can_invite: bool,
    pub can_manage_members: bool,
}

impl MemberPermissions {
    pub fn for_role(role: MemberRole) -> Self {
        match role {
            MemberRole::Admin => Self {
                can_post: true,
                can_create_events: true,
                can_invite: true,
                can_manage_members: true,
            },
            MemberRole::Member => Self::default(),
        }
    }
}

impl Default for MemberPermissions {
    fn default() -> Self {
        Self {
            can_post: true,
            can_create_events: true,
            can_invite: false,
            can_manage_members: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FamilySettings {
    pub is_private: bool,
    pub allow_member_invites: bool,
}

impl Default for FamilySettings {
    fn default() -> Self {
        Self {
            is_private: true,
            allow_member_invites: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub settings: FamilySettings,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Family {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            settings: decode_json(row, "settings")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: String,
    pub family_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub permissions: MemberPermissions,
    pub joined_at: String,
}

impl FamilyMember {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins implicitly hold every permission.
    pub fn can(&self, check: impl Fn(&MemberPermissions) -> bool) -> bool {
        self.is_admin() || check(&self.permissions)
    }
}

impl<'r> FromRow<'r, SqliteRow> for FamilyMember {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            family_id: row.try_get("family_id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            permissions: decode_json(row, "permissions")?,
            joined_at: row.try_get("joined_at")?,
        })
    }
}

/// A membership row joined with the member's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    #[serde(flatten)]
    pub member: FamilyMember,
    pub user: UserSummary,
}

impl<'r> FromRow<'r, SqliteRow> for MemberDetails {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let member = FamilyMember::from_row(row)?;
        let user = UserSummary {
            id: member.user_id.clone(),
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            profile_picture: row.try_get("profile_picture")?,
        };
        Ok(Self { member, user })
    }
}

/// A family as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSummary {
    #[serde(flatten)]
    pub family: Family,
    pub role: MemberRole,
    pub member_count: i64,
}

impl<'r> FromRow<'r, SqliteRow> for MembershipSummary {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            family: Family::from_row(row)?,
            role: row.try_get("role")?,
            member_count: row.try_get("member_count")?,
        })
    }
}
