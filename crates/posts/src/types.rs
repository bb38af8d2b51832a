//! Inputs and views for posts, comments and likes.

use serde::Serialize;
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use utoipa::ToSchema;

use kinnect_database::{Comment, Media, Post, UserSummary};

pub const DEFAULT_FEED_LIMIT: i64 = 20;
pub const MAX_FEED_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub family_ids: Vec<String>,
    pub event_ids: Vec<String>,
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<String>,
}

/// Offset pagination for the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPage {
    pub limit: i64,
    pub offset: i64,
}

impl FeedPage {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for FeedPage {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A post with everything a feed entry shows.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostDetails {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserSummary,
    pub family_ids: Vec<String>,
    pub event_ids: Vec<String>,
    pub media: Vec<Media>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

/// A comment with its author and nested replies.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: UserSummary,
    pub replies: Vec<CommentNode>,
}

impl<'r> FromRow<'r, SqliteRow> for CommentNode {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let comment = Comment::from_row(row)?;
        let author = UserSummary {
            id: comment.author_id.clone(),
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            profile_picture: row.try_get("profile_picture")?,
        };
        Ok(Self {
            comment,
            author,
            replies: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}
