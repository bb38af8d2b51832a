//! User REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use kinnect_database::{ProfileUpdate, User, UserSummary};
use kinnect_users::{AuthenticatedUser, DeletionReport, RegisterInput, MAX_SEARCH_RESULTS};

use crate::error::{ApiResponse, ApiResult, ErrorResponse};
use crate::extract::{require_id, AppJson, AppQuery, AuthUser};
use crate::state::GatewayState;
use crate::validation::{Validator, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

impl From<AuthenticatedUser> for AuthResponse {
    fn from(auth: AuthenticatedUser) -> Self {
        Self {
            user: auth.user,
            token: auth.token,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// At least two characters.
    pub q: Option<String>,
    pub limit: Option<u32>,
}

/// What other users may see of an account.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            profile_picture: user.profile_picture,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSummary {
    pub families_transferred: usize,
    pub families_deleted: usize,
    pub posts_deleted: usize,
    pub media_deleted: usize,
}

impl From<DeletionReport> for DeletionSummary {
    fn from(report: DeletionReport) -> Self {
        Self {
            families_transferred: report.families_transferred,
            families_deleted: report.families_deleted,
            posts_deleted: report.posts_deleted,
            media_deleted: report.media_deleted,
        }
    }
}

/// Registration and login; mounted outside the auth middleware.
pub fn create_public_user_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn create_user_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
        .route("/search", get(search_users))
        .route("/account", delete(delete_account))
        .route("/:id", get(get_user))
}

#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed or email taken", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, ApiResponse<AuthResponse>)> {
    Validator::new()
        .email("email", &payload.email)
        .password("password", &payload.password)
        .length("firstName", &payload.first_name, 1, MAX_NAME_LENGTH)
        .length("lastName", &payload.last_name, 1, MAX_NAME_LENGTH)
        .username("username", payload.username.as_deref())
        .finish()?;

    let registered = state
        .users
        .register(RegisterInput {
            email: payload.email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            username: payload.username,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", registered.into()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    Validator::new()
        .required("email", &payload.email)
        .required("password", &payload.password)
        .finish()?;

    let authenticated = state.users.login(&payload.email, &payload.password).await?;
    Ok(ApiResponse::with_message("Login successful", authenticated.into()))
}

#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "Users",
    responses(
        (status = 200, description = "The current user", body = User),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
) -> ApiResult<ApiResponse<User>> {
    Ok(ApiResponse::ok(state.users.get(&user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    tag = "Users",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> ApiResult<ApiResponse<User>> {
    Validator::new()
        .optional_length("firstName", payload.first_name.as_deref(), 1, MAX_NAME_LENGTH)
        .optional_length("lastName", payload.last_name.as_deref(), 1, MAX_NAME_LENGTH)
        .username("username", payload.username.as_deref())
        .max_length("bio", payload.bio.as_deref(), MAX_DESCRIPTION_LENGTH)
        .date("dateOfBirth", payload.date_of_birth.as_deref())
        .finish()?;

    let updated = state.users.update_profile(&user.id, payload).await?;
    Ok(ApiResponse::with_message("Profile updated successfully", updated))
}

#[utoipa::path(
    put,
    path = "/api/users/password",
    tag = "Users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    Validator::new()
        .required("currentPassword", &payload.current_password)
        .password("newPassword", &payload.new_password)
        .finish()?;

    state
        .users
        .change_password(&user.id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

#[utoipa::path(
    get,
    path = "/api/users/search",
    tag = "Users",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching users", body = Vec<UserSummary>),
        (status = 400, description = "Query too short", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_users(
    State(state): State<Arc<GatewayState>>,
    _user: AuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<ApiResponse<Vec<UserSummary>>> {
    let q = query.q.unwrap_or_default();
    Validator::new().length("q", &q, 2, 100).finish()?;

    let limit = query.limit.unwrap_or(MAX_SEARCH_RESULTS);
    Ok(ApiResponse::ok(state.users.search(&q, limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 400, description = "Invalid ID format", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<GatewayState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<PublicProfile>> {
    require_id(&id)?;
    let found = state.users.get(&id).await?;
    Ok(ApiResponse::ok(found.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/account",
    tag = "Users",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Account and owned content removed", body = DeletionSummary),
        (status = 401, description = "Password is incorrect", body = ErrorResponse),
        (status = 500, description = "Nothing was deleted", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<DeleteAccountRequest>,
) -> ApiResult<ApiResponse<DeletionSummary>> {
    Validator::new().required("password", &payload.password).finish()?;

    let report = state.users.delete_account(&user.id, &payload.password).await?;
    Ok(ApiResponse::with_message("Account deleted successfully", report.into()))
}
