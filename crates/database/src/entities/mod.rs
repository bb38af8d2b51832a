//! Domain entities shared by the service crates

use serde::de::DeserializeOwned;
use sqlx::{sqlite::SqliteRow, Row};

pub mod event;
pub mod family;
pub mod media;
pub mod post;
pub mod user;

pub use event::{
    AttendanceCounts, AttendanceStatus, AttendeeDetails, Event, EventAttendee, EventInvitation,
    InvitationStatus,
};
pub use family::{
    Family, FamilyMember, FamilySettings, MemberDetails, MemberPermissions, MemberRole,
    MembershipSummary,
};
pub use media::{Media, MediaType};
pub use post::{Comment, Like, Post};
pub use user::{NewUser, ProfileUpdate, User, UserSummary};

/// Decode a TEXT column holding JSON. Empty strings decode as the type's default.
pub(crate) fn decode_json<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: DeserializeOwned + Default,
{
    let raw: String = row.try_get(column)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|error| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    })
}
