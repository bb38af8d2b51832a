//! Event, attendance and invitation REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use kinnect_database::{
    AttendanceStatus, AttendeeDetails, Event, EventAttendee, EventInvitation, InvitationStatus,
};
use kinnect_families::{EventDetails, EventFilter, EventUpdate, InvitationDetails, NewEvent};

use crate::error::{ApiError, ApiResponse, ApiResult, ErrorResponse, FieldError};
use crate::extract::{flag, require_id, AppJson, AppQuery, AuthUser};
use crate::state::GatewayState;
use crate::validation::{Validator, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub family_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// RFC 3339 date-time.
    pub start_time: String,
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    pub family_id: Option<String>,
    /// Only events that have not started yet.
    #[serde(default, deserialize_with = "flag")]
    #[param(value_type = Option<bool>)]
    pub upcoming: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendRequest {
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondInvitationRequest {
    /// `accepted` or `declined`.
    pub status: InvitationStatus,
}

pub fn create_event_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/invitations", get(list_invitations))
        .route("/invitations/:invitation_id", put(respond_to_invitation))
        .route("/:id", get(get_event).put(update_event).delete(delete_event))
        .route("/:id/attend", post(attend_event))
        .route("/:id/attendees", get(list_attendees))
        .route("/:id/invitations", post(invite_users))
}

#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event scheduled", body = EventDetails),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Not allowed to create events", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> ApiResult<(StatusCode, ApiResponse<EventDetails>)> {
    Validator::new()
        .id("familyId", &payload.family_id)
        .length("title", &payload.title, 1, MAX_TITLE_LENGTH)
        .max_length("description", payload.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .max_length("location", payload.location.as_deref(), MAX_TITLE_LENGTH)
        .timestamp("startTime", Some(payload.start_time.as_str()))
        .timestamp("endTime", payload.end_time.as_deref())
        .finish()?;

    let event = state
        .events
        .create(
            &user.id,
            NewEvent {
                family_id: payload.family_id,
                title: payload.title,
                description: payload.description,
                location: payload.location,
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Event created successfully", event),
    ))
}

#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    params(ListEventsQuery),
    responses((status = 200, description = "Events ordered by start time", body = Vec<Event>)),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<ListEventsQuery>,
) -> ApiResult<ApiResponse<Vec<Event>>> {
    if let Some(family_id) = &query.family_id {
        require_id(family_id)?;
    }

    let events = state
        .events
        .list(
            &user.id,
            EventFilter {
                family_id: query.family_id,
                upcoming: query.upcoming,
            },
        )
        .await?;
    Ok(ApiResponse::ok(events))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event with attendance counts", body = EventDetails),
        (status = 403, description = "Not a member or invitee", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<EventDetails>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.events.get(&id, &user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 403, description = "Creator or family admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_event(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> ApiResult<ApiResponse<Event>> {
    require_id(&id)?;
    Validator::new()
        .optional_length("title", payload.title.as_deref(), 1, MAX_TITLE_LENGTH)
        .max_length("description", payload.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .max_length("location", payload.location.as_deref(), MAX_TITLE_LENGTH)
        .timestamp("startTime", payload.start_time.as_deref())
        .timestamp("endTime", payload.end_time.as_deref())
        .finish()?;

    let event = state
        .events
        .update(
            &id,
            &user.id,
            EventUpdate {
                title: payload.title,
                description: payload.description,
                location: payload.location,
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
        )
        .await?;
    Ok(ApiResponse::with_message("Event updated successfully", event))
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event removed with its attendance and invitations"),
        (status = 403, description = "Creator or family admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&id)?;
    state.events.delete(&id, &user.id).await?;
    Ok(ApiResponse::message("Event deleted successfully"))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/attend",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    request_body = AttendRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = EventAttendee),
        (status = 403, description = "Not a member or invitee", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn attend_event(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<AttendRequest>,
) -> ApiResult<ApiResponse<EventAttendee>> {
    require_id(&id)?;
    let attendee = state.events.attend(&id, &user.id, payload.status).await?;
    Ok(ApiResponse::with_message("Attendance updated", attendee))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}/attendees",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    responses((status = 200, description = "Attendees with their profiles", body = Vec<AttendeeDetails>)),
    security(("bearer_auth" = []))
)]
pub async fn list_attendees(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<AttendeeDetails>>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.events.attendees(&id, &user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/invitations",
    tag = "Events",
    params(("id" = String, Path, description = "Event id")),
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Newly created invitations", body = Vec<EventInvitation>),
        (status = 403, description = "Not allowed to invite", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn invite_users(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<InviteRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Vec<EventInvitation>>)> {
    require_id(&id)?;
    let mut validator = Validator::new();
    if payload.user_ids.is_empty() {
        validator.error("userIds", "Provide at least one user to invite");
    }
    validator.ids("userIds", &payload.user_ids).finish()?;

    let invitations = state.events.invite(&id, &user.id, &payload.user_ids).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Invitations sent", invitations),
    ))
}

#[utoipa::path(
    get,
    path = "/api/events/invitations",
    tag = "Events",
    responses((status = 200, description = "The caller's pending invitations", body = Vec<InvitationDetails>)),
    security(("bearer_auth" = []))
)]
pub async fn list_invitations(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
) -> ApiResult<ApiResponse<Vec<InvitationDetails>>> {
    Ok(ApiResponse::ok(state.events.pending_invitations(&user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/events/invitations/{invitation_id}",
    tag = "Events",
    params(("invitation_id" = String, Path, description = "Invitation id")),
    request_body = RespondInvitationRequest,
    responses(
        (status = 200, description = "Invitation answered", body = EventInvitation),
        (status = 400, description = "Already answered", body = ErrorResponse),
        (status = 403, description = "Not the invitee", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_to_invitation(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(invitation_id): Path<String>,
    AppJson(payload): AppJson<RespondInvitationRequest>,
) -> ApiResult<ApiResponse<EventInvitation>> {
    require_id(&invitation_id)?;
    if payload.status == InvitationStatus::Pending {
        return Err(ApiError::validation(vec![FieldError::new(
            "status",
            "Status must be accepted or declined",
        )]));
    }

    let invitation = state
        .events
        .respond(&invitation_id, &user.id, payload.status)
        .await?;
    Ok(ApiResponse::with_message("Invitation updated", invitation))
}
