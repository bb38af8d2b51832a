//! Inputs accepted and views returned by the family and event services.

use serde::Serialize;
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use utoipa::ToSchema;

use kinnect_database::{
    AttendanceCounts, AttendanceStatus, Event, EventInvitation, Family, FamilySettings,
    MemberDetails, MemberPermissions, MemberRole,
};

#[derive(Debug, Clone)]
pub struct NewFamily {
    pub name: String,
    pub description: Option<String>,
    pub settings: Option<FamilySettings>,
}

/// Partial family update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct FamilyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<FamilySettings>,
}

/// How the user being added to a family is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberTarget {
    UserId(String),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub target: MemberTarget,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberUpdate {
    pub role: Option<MemberRole>,
    pub permissions: Option<MemberPermissions>,
}

/// A family together with its members.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetails {
    #[serde(flatten)]
    pub family: Family,
    pub members: Vec<MemberDetails>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub family_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub family_id: Option<String>,
    pub upcoming: bool,
}

/// An event with its attendance tallies and the viewer's own response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub attendance: AttendanceCounts,
    pub my_status: Option<AttendanceStatus>,
}

/// A pending invitation shown with the event it is for.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDetails {
    #[serde(flatten)]
    pub invitation: EventInvitation,
    pub event: Event,
}

impl<'r> FromRow<'r, SqliteRow> for InvitationDetails {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let invitation = EventInvitation::from_row(row)?;
        let event = Event {
            id: invitation.event_id.clone(),
            family_id: row.try_get("family_id")?,
            created_by: row.try_get("event_created_by")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            created_at: row.try_get("event_created_at")?,
            updated_at: row.try_get("event_updated_at")?,
        };
        Ok(Self { invitation, event })
    }
}
