//! # Kinnect Gateway Crate
//!
//! The HTTP surface of the Kinnect backend. Requests pass through rate
//! limiting, logging, CORS and bearer-token authentication before reaching
//! the REST handlers, which call into the domain services and answer with the
//! `{success, message?, data}` envelope.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kinnect_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(pool, config, store);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
//! ```

pub mod error;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod validation;

pub use error::{ApiError, ApiResponse, ApiResult, ErrorResponse, FieldError};
pub use extract::AuthUser;
pub use middleware::{auth_middleware, RateLimiter};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use kinnect_config::StorageBackend;

/// Headroom over the upload limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    let config = Arc::clone(&arc_state.config);

    let mut router = Router::new().merge(
        rest::create_rest_routes(Arc::clone(&arc_state)).with_state(Arc::clone(&arc_state)),
    );

    if config.storage.backend == StorageBackend::Local {
        router = router.nest_service("/uploads", ServeDir::new(&config.storage.local_root));
    }

    #[cfg(debug_assertions)]
    {
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    for (name, value) in middleware::security_headers() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
    }

    router
        .layer(DefaultBodyLimit::max(
            config.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&arc_state),
            middleware::rate_limit_middleware,
        ))
        .layer(middleware::create_cors_layer(&config.cors))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}

#[cfg(debug_assertions)]
#[derive(OpenApi)]
#[openapi(
    info(title = "Kinnect API", description = "Family social network backend"),
    paths(
        rest::health::health_check,
        rest::users::register,
        rest::users::login,
        rest::users::get_profile,
        rest::users::update_profile,
        rest::users::change_password,
        rest::users::search_users,
        rest::users::get_user,
        rest::users::delete_account,
        rest::families::create_family,
        rest::families::list_families,
        rest::families::get_family,
        rest::families::update_family,
        rest::families::delete_family,
        rest::families::list_members,
        rest::families::add_member,
        rest::families::update_member,
        rest::families::remove_member,
        rest::events::create_event,
        rest::events::list_events,
        rest::events::get_event,
        rest::events::update_event,
        rest::events::delete_event,
        rest::events::attend_event,
        rest::events::list_attendees,
        rest::events::invite_users,
        rest::events::list_invitations,
        rest::events::respond_to_invitation,
        rest::posts::create_post,
        rest::posts::get_feed,
        rest::posts::get_post,
        rest::posts::update_post,
        rest::posts::delete_post,
        rest::posts::create_comment,
        rest::posts::list_comments,
        rest::posts::delete_comment,
        rest::posts::toggle_like,
        rest::posts::list_likes,
        rest::media::upload_media,
        rest::media::list_media,
        rest::media::get_media,
        rest::media::delete_media,
    ),
    components(
        schemas(
            error::ErrorResponse,
            error::FieldError,
            rest::health::HealthResponse,
            rest::users::RegisterRequest,
            rest::users::LoginRequest,
            rest::users::AuthResponse,
            rest::users::ChangePasswordRequest,
            rest::users::PublicProfile,
            rest::users::DeleteAccountRequest,
            rest::users::DeletionSummary,
            rest::families::CreateFamilyRequest,
            rest::families::UpdateFamilyRequest,
            rest::families::AddMemberRequest,
            rest::families::UpdateMemberRequest,
            rest::events::CreateEventRequest,
            rest::events::UpdateEventRequest,
            rest::events::AttendRequest,
            rest::events::InviteRequest,
            rest::events::RespondInvitationRequest,
            rest::posts::CreatePostRequest,
            rest::posts::UpdatePostRequest,
            rest::posts::CreateCommentRequest,
            rest::media::UploadForm,
            kinnect_database::User,
            kinnect_database::UserSummary,
            kinnect_database::ProfileUpdate,
            kinnect_database::Family,
            kinnect_database::FamilySettings,
            kinnect_database::FamilyMember,
            kinnect_database::MemberRole,
            kinnect_database::MemberPermissions,
            kinnect_database::MemberDetails,
            kinnect_database::MembershipSummary,
            kinnect_database::Event,
            kinnect_database::EventAttendee,
            kinnect_database::EventInvitation,
            kinnect_database::AttendanceStatus,
            kinnect_database::AttendanceCounts,
            kinnect_database::AttendeeDetails,
            kinnect_database::InvitationStatus,
            kinnect_database::Post,
            kinnect_database::Comment,
            kinnect_database::Media,
            kinnect_database::MediaType,
            kinnect_families::FamilyDetails,
            kinnect_families::EventDetails,
            kinnect_families::InvitationDetails,
            kinnect_posts::PostDetails,
            kinnect_posts::CommentNode,
            kinnect_posts::LikeToggle,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Users", description = "Accounts, profiles and authentication"),
        (name = "Families", description = "Families and membership"),
        (name = "Events", description = "Events, attendance and invitations"),
        (name = "Posts", description = "Posts, comments and likes"),
        (name = "Media", description = "File uploads"),
    )
)]
struct ApiDoc;

#[cfg(debug_assertions)]
struct SecurityAddon;

#[cfg(debug_assertions)]
impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
