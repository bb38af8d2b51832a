//! Demo data for local development.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use kinnect_auth::JwtManager;
use kinnect_config::AppConfig;
use kinnect_database::MemberRole;
use kinnect_families::{EventService, FamilyService, MemberTarget, NewEvent, NewFamily, NewMember};
use kinnect_media::ObjectStore;
use kinnect_posts::{CommentService, NewComment, NewPost, PostService};
use kinnect_users::{RegisterInput, UserService};
use sqlx::SqlitePool;
use tracing::info;

pub const DEMO_PASSWORD: &str = "kinnect-demo-1";

const DEMO_USERS: [(&str, &str, &str, &str); 3] = [
    ("alice@kinnect.test", "alice", "Alice", "Harper"),
    ("ben@kinnect.test", "ben", "Ben", "Harper"),
    ("carla@kinnect.test", "carla", "Carla", "Ortiz"),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub families: usize,
    pub events: usize,
    pub posts: usize,
}

/// Populate an empty database with a small demo family. A database that
/// already has users is left alone.
pub async fn seed_demo_data(
    pool: &SqlitePool,
    store: Arc<dyn ObjectStore>,
    config: &AppConfig,
) -> Result<Option<SeedReport>> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("failed to count users")?;
    if existing > 0 {
        info!(existing, "database already has users, skipping seed");
        return Ok(None);
    }

    let jwt = Arc::new(JwtManager::from_config(&config.auth));
    let users = UserService::new(pool.clone(), jwt, store);
    let families = FamilyService::new(pool.clone());
    let events = EventService::new(pool.clone());
    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool.clone());

    let mut ids = Vec::with_capacity(DEMO_USERS.len());
    for (email, username, first_name, last_name) in DEMO_USERS {
        let registered = users
            .register(RegisterInput {
                email: email.to_string(),
                password: DEMO_PASSWORD.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                username: Some(username.to_string()),
            })
            .await
            .with_context(|| format!("failed to register {email}"))?;
        ids.push(registered.user.id);
    }
    let (alice, ben, carla) = (&ids[0], &ids[1], &ids[2]);

    let family = families
        .create(
            alice,
            NewFamily {
                name: "The Harpers".to_string(),
                description: Some("Sunday dinners and everything in between".to_string()),
                settings: None,
            },
        )
        .await
        .context("failed to create demo family")?;
    families
        .add_member(
            &family.id,
            alice,
            NewMember {
                target: MemberTarget::UserId(ben.clone()),
                role: Some(MemberRole::Member),
            },
        )
        .await
        .context("failed to add demo member")?;

    let start = Utc::now() + Duration::days(14);
    let event = events
        .create(
            alice,
            NewEvent {
                family_id: family.id.clone(),
                title: "Summer picnic".to_string(),
                description: Some("Bring a dish to share".to_string()),
                location: Some("Riverside park".to_string()),
                start_time: start.to_rfc3339(),
                end_time: Some((start + Duration::hours(4)).to_rfc3339()),
            },
        )
        .await
        .context("failed to create demo event")?;
    events
        .invite(&event.event.id, alice, &[carla.clone()])
        .await
        .context("failed to invite demo guest")?;

    let post = posts
        .create(
            alice,
            NewPost {
                content: "Picnic is on! Who is bringing dessert?".to_string(),
                family_ids: vec![family.id.clone()],
                event_ids: vec![event.event.id.clone()],
                media_ids: Vec::new(),
            },
        )
        .await
        .context("failed to create demo post")?;
    comments
        .create(
            &post.post.id,
            ben,
            NewComment {
                content: "I'll make the lemon tart.".to_string(),
                parent_id: None,
            },
        )
        .await
        .context("failed to create demo comment")?;

    Ok(Some(SeedReport {
        users: ids.len(),
        families: 1,
        events: 1,
        posts: 1,
    }))
}
