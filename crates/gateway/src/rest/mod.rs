//! REST API endpoints for the gateway

pub mod events;
pub mod families;
pub mod health;
pub mod media;
pub mod posts;
pub mod users;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// Every `/api` route. Only registration and login skip authentication.
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let protected = Router::new()
        .nest("/api/users", users::create_user_routes())
        .nest("/api/families", families::create_family_routes())
        .nest("/api/events", events::create_event_routes())
        .nest("/api/posts", posts::create_post_routes())
        .nest("/api/media", media::create_media_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .nest("/api/users", users::create_public_user_routes())
        .merge(protected)
        .route("/health", axum::routing::get(health::health_check))
}
