//! Family and membership REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use kinnect_database::{
    Family, FamilySettings, MemberDetails, MemberPermissions, MemberRole, MembershipSummary,
};
use kinnect_families::{FamilyDetails, FamilyUpdate, MemberTarget, MemberUpdate, NewFamily, NewMember};

use crate::error::{ApiError, ApiResponse, ApiResult, ErrorResponse, FieldError};
use crate::extract::{require_id, AppJson, AuthUser};
use crate::state::GatewayState;
use crate::validation::{Validator, MAX_DESCRIPTION_LENGTH, MAX_FAMILY_NAME_LENGTH};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFamilyRequest {
    pub name: String,
    pub description: Option<String>,
    pub settings: Option<FamilySettings>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFamilyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<FamilySettings>,
}

/// Identify the new member by `userId` or by `email`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRequest {
    pub role: Option<MemberRole>,
    pub permissions: Option<MemberPermissions>,
}

pub fn create_family_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(list_families).post(create_family))
        .route("/:id", get(get_family).put(update_family).delete(delete_family))
        .route("/:id/members", get(list_members).post(add_member))
        .route("/:id/members/:user_id", put(update_member).delete(remove_member))
}

#[utoipa::path(
    post,
    path = "/api/families",
    tag = "Families",
    request_body = CreateFamilyRequest,
    responses(
        (status = 201, description = "Family created with the caller as admin", body = Family),
        (status = 400, description = "Validation failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_family(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateFamilyRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Family>)> {
    Validator::new()
        .length("name", &payload.name, 1, MAX_FAMILY_NAME_LENGTH)
        .max_length("description", payload.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .finish()?;

    let family = state
        .families
        .create(
            &user.id,
            NewFamily {
                name: payload.name,
                description: payload.description,
                settings: payload.settings,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Family created successfully", family),
    ))
}

#[utoipa::path(
    get,
    path = "/api/families",
    tag = "Families",
    responses((status = 200, description = "The caller's families", body = Vec<MembershipSummary>)),
    security(("bearer_auth" = []))
)]
pub async fn list_families(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
) -> ApiResult<ApiResponse<Vec<MembershipSummary>>> {
    Ok(ApiResponse::ok(state.families.list_for_user(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/families/{id}",
    tag = "Families",
    params(("id" = String, Path, description = "Family id")),
    responses(
        (status = 200, description = "Family with its members", body = FamilyDetails),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Family not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_family(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<FamilyDetails>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.families.get(&id, &user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/families/{id}",
    tag = "Families",
    params(("id" = String, Path, description = "Family id")),
    request_body = UpdateFamilyRequest,
    responses(
        (status = 200, description = "Family updated", body = Family),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_family(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateFamilyRequest>,
) -> ApiResult<ApiResponse<Family>> {
    require_id(&id)?;
    Validator::new()
        .optional_length("name", payload.name.as_deref(), 1, MAX_FAMILY_NAME_LENGTH)
        .max_length("description", payload.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .finish()?;

    let family = state
        .families
        .update(
            &id,
            &user.id,
            FamilyUpdate {
                name: payload.name,
                description: payload.description,
                settings: payload.settings,
            },
        )
        .await?;
    Ok(ApiResponse::with_message("Family updated successfully", family))
}

#[utoipa::path(
    delete,
    path = "/api/families/{id}",
    tag = "Families",
    params(("id" = String, Path, description = "Family id")),
    responses(
        (status = 200, description = "Family and its events removed"),
        (status = 403, description = "Only the creator may delete", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_family(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&id)?;
    state.families.delete(&id, &user.id).await?;
    Ok(ApiResponse::message("Family deleted successfully"))
}

#[utoipa::path(
    get,
    path = "/api/families/{id}/members",
    tag = "Families",
    params(("id" = String, Path, description = "Family id")),
    responses(
        (status = 200, description = "Members with their profiles", body = Vec<MemberDetails>),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<MemberDetails>>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.families.list_members(&id, &user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/families/{id}/members",
    tag = "Families",
    params(("id" = String, Path, description = "Family id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = MemberDetails),
        (status = 400, description = "Already a member", body = ErrorResponse),
        (status = 403, description = "Not allowed to invite", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, ApiResponse<MemberDetails>)> {
    require_id(&id)?;

    let target = match (payload.user_id, payload.email) {
        (Some(user_id), None) => {
            Validator::new().id("userId", &user_id).finish()?;
            MemberTarget::UserId(user_id)
        }
        (None, Some(email)) => {
            Validator::new().email("email", &email).finish()?;
            MemberTarget::Email(email)
        }
        _ => {
            return Err(ApiError::validation(vec![FieldError::new(
                "userId",
                "Provide either userId or email",
            )]))
        }
    };

    let member = state
        .families
        .add_member(
            &id,
            &user.id,
            NewMember {
                target,
                role: payload.role,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Member added successfully", member),
    ))
}

#[utoipa::path(
    put,
    path = "/api/families/{id}/members/{user_id}",
    tag = "Families",
    params(
        ("id" = String, Path, description = "Family id"),
        ("user_id" = String, Path, description = "Member's user id")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member updated", body = MemberDetails),
        (status = 400, description = "Family must have at least one admin", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_member(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path((id, member_id)): Path<(String, String)>,
    AppJson(payload): AppJson<UpdateMemberRequest>,
) -> ApiResult<ApiResponse<MemberDetails>> {
    require_id(&id)?;
    require_id(&member_id)?;

    if payload.role.is_none() && payload.permissions.is_none() {
        return Err(ApiError::validation(vec![FieldError::new(
            "role",
            "Provide a role or permissions to change",
        )]));
    }

    let member = state
        .families
        .update_member(
            &id,
            &user.id,
            &member_id,
            MemberUpdate {
                role: payload.role,
                permissions: payload.permissions,
            },
        )
        .await?;
    Ok(ApiResponse::with_message("Member updated successfully", member))
}

#[utoipa::path(
    delete,
    path = "/api/families/{id}/members/{user_id}",
    tag = "Families",
    params(
        ("id" = String, Path, description = "Family id"),
        ("user_id" = String, Path, description = "Member's user id")
    ),
    responses(
        (status = 200, description = "Member removed"),
        (status = 400, description = "Cannot remove the family creator or the last admin", body = ErrorResponse),
        (status = 403, description = "Admins or the member themselves", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&id)?;
    require_id(&member_id)?;
    state.families.remove_member(&id, &user.id, &member_id).await?;
    Ok(ApiResponse::message("Member removed successfully"))
}
