//! Shared application state for the gateway

use std::sync::Arc;

use sqlx::SqlitePool;

use kinnect_auth::JwtManager;
use kinnect_config::AppConfig;
use kinnect_families::{EventService, FamilyService};
use kinnect_media::{MediaService, ObjectStore};
use kinnect_posts::{CommentService, LikeService, PostService};
use kinnect_users::UserService;

use crate::middleware::RateLimiter;

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct GatewayState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub families: FamilyService,
    pub events: EventService,
    pub posts: PostService,
    pub comments: CommentService,
    pub likes: LikeService,
    pub media: MediaService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, config: AppConfig, store: Arc<dyn ObjectStore>) -> Self {
        let jwt = Arc::new(JwtManager::from_config(&config.auth));

        Self {
            users: UserService::new(pool.clone(), jwt, Arc::clone(&store)),
            families: FamilyService::new(pool.clone()),
            events: EventService::new(pool.clone()),
            posts: PostService::new(pool.clone()),
            comments: CommentService::new(pool.clone()),
            likes: LikeService::new(pool.clone()),
            media: MediaService::new(pool.clone(), store, config.storage.max_upload_bytes),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config: Arc::new(config),
            pool,
        }
    }
}
