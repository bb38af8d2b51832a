//! Event, attendance and invitation entity definitions

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use super::user::UserSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub family_id: String,
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Going,
    Maybe,
    NotGoing,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Going => "going",
            AttendanceStatus::Maybe => "maybe",
            AttendanceStatus::NotGoing => "not_going",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: AttendanceStatus,
    pub responded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeDetails {
    #[serde(flatten)]
    pub attendee: EventAttendee,
    pub user: UserSummary,
}

impl<'r> FromRow<'r, SqliteRow> for AttendeeDetails {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let attendee = EventAttendee::from_row(row)?;
        let user = UserSummary {
            id: attendee.user_id.clone(),
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            profile_picture: row.try_get("profile_picture")?,
        };
        Ok(Self { attendee, user })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventInvitation {
    pub id: String,
    pub event_id: String,
    pub invitee_id: String,
    pub invited_by: String,
    pub status: InvitationStatus,
    pub created_at: String,
    pub responded_at: Option<String>,
}

/// Attendance tallies shown alongside an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    pub going: i64,
    pub maybe: i64,
    pub not_going: i64,
}
