//! Family events, attendance and invitations.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use kinnect_database::graph::delete_event_graph;
use kinnect_database::membership::find_membership;
use kinnect_database::{
    new_id, timestamp, AttendanceCounts, AttendanceStatus, AttendeeDetails, Event, EventAttendee,
    EventInvitation, FamilyMember, InvitationStatus, ServiceError, ServiceResult,
};

use super::require_member;
use crate::types::{EventDetails, EventFilter, EventUpdate, InvitationDetails, NewEvent};

const EVENT_COLUMNS: &str = "id, family_id, created_by, title, description, location, start_time, \
     end_time, created_at, updated_at";

const INVITATION_COLUMNS: &str =
    "id, event_id, invitee_id, invited_by, status, created_at, responded_at";

#[derive(Clone)]
pub struct EventService {
    pool: SqlitePool,
}

/// How the viewer is allowed to see an event.
enum EventAccess {
    Member(FamilyMember),
    Invitee,
}

impl EventService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Schedule an event. The creator is recorded as going.
    pub async fn create(&self, user_id: &str, input: NewEvent) -> ServiceResult<EventDetails> {
        let member = require_member(&self.pool, &input.family_id, user_id).await?;
        if !member.can(|p| p.can_create_events) {
            return Err(ServiceError::forbidden("You do not have permission to create events"));
        }

        let start_time = normalize_time("startTime", &input.start_time)?;
        let end_time = input
            .end_time
            .as_deref()
            .map(|value| normalize_time("endTime", value))
            .transpose()?;
        check_order(&start_time, end_time.as_deref())?;

        let id = new_id();
        let now = timestamp();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO events (id, family_id, created_by, title, description, location, start_time, end_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&input.family_id)
        .bind(user_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.location)
        .bind(&start_time)
        .bind(&end_time)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        upsert_attendance(&mut tx, &id, user_id, AttendanceStatus::Going).await?;
        tx.commit().await?;

        info!(event_id = %id, family_id = %input.family_id, user_id, "created event");
        self.get(&id, user_id).await
    }

    /// Events from the caller's families, earliest first.
    pub async fn list(&self, user_id: &str, filter: EventFilter) -> ServiceResult<Vec<Event>> {
        if let Some(family_id) = &filter.family_id {
            require_member(&self.pool, family_id, user_id).await?;
        }

        let mut sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE family_id IN (SELECT family_id FROM family_members WHERE user_id = ?)"
        );
        if filter.family_id.is_some() {
            sql.push_str(" AND family_id = ?");
        }
        if filter.upcoming {
            sql.push_str(" AND start_time >= ?");
        }
        sql.push_str(" ORDER BY start_time, id");

        let mut query = sqlx::query_as::<_, Event>(&sql).bind(user_id);
        if let Some(family_id) = &filter.family_id {
            query = query.bind(family_id);
        }
        if filter.upcoming {
            query = query.bind(timestamp());
        }

        let events = query.fetch_all(&self.pool).await?;
        Ok(events)
    }

    pub async fn get(&self, event_id: &str, user_id: &str) -> ServiceResult<EventDetails> {
        let event = self.load(event_id).await?;
        self.access(&event, user_id).await?;

        let attendance = self.counts(event_id).await?;
        let my_status: Option<AttendanceStatus> = sqlx::query_scalar(
            "SELECT status FROM event_attendees WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(EventDetails {
            event,
            attendance,
            my_status,
        })
    }

    pub async fn update(&self, event_id: &str, user_id: &str, update: EventUpdate) -> ServiceResult<Event> {
        let event = self.load(event_id).await?;
        self.require_organizer(&event, user_id).await?;

        let start_time = update
            .start_time
            .as_deref()
            .map(|value| normalize_time("startTime", value))
            .transpose()?;
        let end_time = update
            .end_time
            .as_deref()
            .map(|value| normalize_time("endTime", value))
            .transpose()?;
        check_order(
            start_time.as_deref().unwrap_or(&event.start_time),
            end_time.as_deref().or(event.end_time.as_deref()),
        )?;

        sqlx::query(
            "UPDATE events SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                start_time = COALESCE(?, start_time),
                end_time = COALESCE(?, end_time),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(update.title.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(&update.location)
        .bind(&start_time)
        .bind(&end_time)
        .bind(timestamp())
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        info!(event_id, user_id, "updated event");
        self.load(event_id).await
    }

    pub async fn delete(&self, event_id: &str, user_id: &str) -> ServiceResult<()> {
        let event = self.load(event_id).await?;
        self.require_organizer(&event, user_id).await?;

        let mut tx = self.pool.begin().await?;
        delete_event_graph(&mut tx, event_id).await?;
        tx.commit().await?;

        info!(event_id, user_id, "deleted event");
        Ok(())
    }

    /// Record or change the caller's response.
    pub async fn attend(
        &self,
        event_id: &str,
        user_id: &str,
        status: AttendanceStatus,
    ) -> ServiceResult<EventAttendee> {
        let event = self.load(event_id).await?;
        self.access(&event, user_id).await?;

        let mut conn = self.pool.acquire().await?;
        let attendee = upsert_attendance(&mut conn, event_id, user_id, status).await?;

        debug!(event_id, user_id, status = status.as_str(), "recorded attendance");
        Ok(attendee)
    }

    pub async fn attendees(&self, event_id: &str, user_id: &str) -> ServiceResult<Vec<AttendeeDetails>> {
        let event = self.load(event_id).await?;
        self.access(&event, user_id).await?;

        let attendees = sqlx::query_as::<_, AttendeeDetails>(
            "SELECT a.id, a.event_id, a.user_id, a.status, a.responded_at,
                    u.username, u.first_name, u.last_name, u.profile_picture
             FROM event_attendees a
             JOIN users u ON u.id = a.user_id
             WHERE a.event_id = ?
             ORDER BY a.responded_at, a.id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attendees)
    }

    /// Invite users to an event. Users already invited are skipped; the
    /// returned list holds only the new invitations.
    pub async fn invite(
        &self,
        event_id: &str,
        actor_id: &str,
        user_ids: &[String],
    ) -> ServiceResult<Vec<EventInvitation>> {
        let event = self.load(event_id).await?;
        let actor = require_member(&self.pool, &event.family_id, actor_id).await?;
        if event.created_by != actor_id && !actor.can(|p| p.can_invite) {
            return Err(ServiceError::forbidden("You do not have permission to invite to this event"));
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();
        for invitee_id in user_ids {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(invitee_id)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                return Err(ServiceError::not_found("User"));
            }
            if invitee_id == actor_id {
                continue;
            }

            let id = new_id();
            let inserted = sqlx::query(
                "INSERT INTO event_invitations (id, event_id, invitee_id, invited_by, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (event_id, invitee_id) DO NOTHING",
            )
            .bind(&id)
            .bind(event_id)
            .bind(invitee_id)
            .bind(actor_id)
            .bind(InvitationStatus::Pending)
            .bind(timestamp())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted > 0 {
                created.push(fetch_invitation(&mut tx, &id).await?.ok_or_else(|| {
                    ServiceError::internal("invitation vanished after insert")
                })?);
            }
        }
        tx.commit().await?;

        info!(event_id, invited_by = actor_id, invited = created.len(), "sent event invitations");
        Ok(created)
    }

    /// The caller's invitations that still await an answer.
    pub async fn pending_invitations(&self, user_id: &str) -> ServiceResult<Vec<InvitationDetails>> {
        let invitations = sqlx::query_as::<_, InvitationDetails>(
            "SELECT i.id, i.event_id, i.invitee_id, i.invited_by, i.status, i.created_at, i.responded_at,
                    e.family_id, e.created_by AS event_created_by, e.title, e.description, e.location,
                    e.start_time, e.end_time, e.created_at AS event_created_at,
                    e.updated_at AS event_updated_at
             FROM event_invitations i
             JOIN events e ON e.id = i.event_id
             WHERE i.invitee_id = ? AND i.status = ?
             ORDER BY e.start_time, i.id",
        )
        .bind(user_id)
        .bind(InvitationStatus::Pending)
        .fetch_all(&self.pool)
        .await?;
        Ok(invitations)
    }

    /// Accept or decline. Accepting also marks the invitee as going.
    pub async fn respond(
        &self,
        invitation_id: &str,
        user_id: &str,
        status: InvitationStatus,
    ) -> ServiceResult<EventInvitation> {
        if status == InvitationStatus::Pending {
            return Err(ServiceError::bad_request("Status must be accepted or declined"));
        }

        let mut tx = self.pool.begin().await?;
        let invitation = fetch_invitation(&mut tx, invitation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation"))?;

        if invitation.invitee_id != user_id {
            return Err(ServiceError::forbidden("This invitation is not addressed to you"));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(ServiceError::bad_request("Invitation has already been answered"));
        }

        sqlx::query("UPDATE event_invitations SET status = ?, responded_at = ? WHERE id = ?")
            .bind(status)
            .bind(timestamp())
            .bind(invitation_id)
            .execute(&mut *tx)
            .await?;

        if status == InvitationStatus::Accepted {
            upsert_attendance(&mut tx, &invitation.event_id, user_id, AttendanceStatus::Going).await?;
        }

        let updated = fetch_invitation(&mut tx, invitation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation"))?;
        tx.commit().await?;

        info!(invitation_id, user_id, accepted = status == InvitationStatus::Accepted, "answered invitation");
        Ok(updated)
    }

    async fn load(&self, event_id: &str) -> ServiceResult<Event> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Event"))
    }

    async fn access(&self, event: &Event, user_id: &str) -> ServiceResult<EventAccess> {
        if let Some(member) = find_membership(&self.pool, &event.family_id, user_id).await? {
            return Ok(EventAccess::Member(member));
        }

        let invited: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM event_invitations WHERE event_id = ? AND invitee_id = ?)",
        )
        .bind(&event.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if invited {
            Ok(EventAccess::Invitee)
        } else {
            Err(ServiceError::forbidden("You do not have access to this event"))
        }
    }

    /// The event's creator or an admin of its family.
    async fn require_organizer(&self, event: &Event, user_id: &str) -> ServiceResult<()> {
        if event.created_by == user_id {
            return Ok(());
        }
        match self.access(event, user_id).await {
            Ok(EventAccess::Member(member)) if member.is_admin() => Ok(()),
            Ok(_) => Err(ServiceError::forbidden(
                "Only the event creator or a family admin can change this event",
            )),
            Err(error) => Err(error),
        }
    }

    async fn counts(&self, event_id: &str) -> ServiceResult<AttendanceCounts> {
        let rows: Vec<(AttendanceStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM event_attendees WHERE event_id = ? GROUP BY status",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = AttendanceCounts::default();
        for (status, count) in rows {
            match status {
                AttendanceStatus::Going => counts.going = count,
                AttendanceStatus::Maybe => counts.maybe = count,
                AttendanceStatus::NotGoing => counts.not_going = count,
            }
        }
        Ok(counts)
    }
}

async fn upsert_attendance(
    conn: &mut SqliteConnection,
    event_id: &str,
    user_id: &str,
    status: AttendanceStatus,
) -> ServiceResult<EventAttendee> {
    let attendee = sqlx::query_as::<_, EventAttendee>(
        "INSERT INTO event_attendees (id, event_id, user_id, status, responded_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (event_id, user_id)
         DO UPDATE SET status = excluded.status, responded_at = excluded.responded_at
         RETURNING id, event_id, user_id, status, responded_at",
    )
    .bind(new_id())
    .bind(event_id)
    .bind(user_id)
    .bind(status)
    .bind(timestamp())
    .fetch_one(conn)
    .await?;
    Ok(attendee)
}

async fn fetch_invitation(
    conn: &mut SqliteConnection,
    invitation_id: &str,
) -> Result<Option<EventInvitation>, sqlx::Error> {
    sqlx::query_as::<_, EventInvitation>(&format!(
        "SELECT {INVITATION_COLUMNS} FROM event_invitations WHERE id = ?"
    ))
    .bind(invitation_id)
    .fetch_optional(conn)
    .await
}

/// Parse an RFC 3339 timestamp and store it in UTC so that string order is time order.
fn normalize_time(field: &str, value: &str) -> ServiceResult<String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc).to_rfc3339())
        .map_err(|_| ServiceError::bad_request(format!("{field} must be an RFC 3339 timestamp")))
}

fn check_order(start_time: &str, end_time: Option<&str>) -> ServiceResult<()> {
    match end_time {
        Some(end_time) if end_time < start_time => Err(ServiceError::bad_request(
            "End time must not be before start time",
        )),
        _ => Ok(()),
    }
}
