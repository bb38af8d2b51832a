//! Likes on posts.

use sqlx::SqlitePool;
use tracing::debug;

use kinnect_database::{new_id, timestamp, PostRepository, ServiceResult, UserSummary};

use super::visible_post;
use crate::types::LikeToggle;

#[derive(Clone)]
pub struct LikeService {
    pool: SqlitePool,
    post_repository: PostRepository,
}

impl LikeService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            post_repository: PostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Like the post, or remove the like if it is already there.
    pub async fn toggle(&self, post_id: &str, user_id: &str) -> ServiceResult<LikeToggle> {
        visible_post(&self.post_repository, post_id, user_id).await?;

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = removed == 0;
        if liked {
            sqlx::query("INSERT INTO likes (id, post_id, user_id, created_at) VALUES (?, ?, ?, ?)")
                .bind(new_id())
                .bind(post_id)
                .bind(user_id)
                .bind(timestamp())
                .execute(&mut *tx)
                .await?;
        }

        let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(post_id, user_id, liked, like_count, "toggled like");
        Ok(LikeToggle { liked, like_count })
    }

    /// Users who liked the post, most recent first.
    pub async fn likers(&self, post_id: &str, user_id: &str) -> ServiceResult<Vec<UserSummary>> {
        visible_post(&self.post_repository, post_id, user_id).await?;

        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.profile_picture
             FROM likes l
             JOIN users u ON u.id = l.user_id
             WHERE l.post_id = ?
             ORDER BY l.created_at DESC, l.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
