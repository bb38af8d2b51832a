//! Repository for posts and the rows hanging off them.

use sqlx::SqlitePool;

use crate::entities::{Media, Post, UserSummary};
use crate::graph::delete_post_graph;
use crate::types::{ServiceError, ServiceResult};

const POST_COLUMNS: &str = "id, author_id, content, created_at, updated_at";

/// Associations of a post, as stored alongside it.
#[derive(Debug, Clone, Default)]
pub struct PostLinks<'a> {
    pub family_ids: &'a [String],
    pub event_ids: &'a [String],
    pub media_ids: &'a [String],
}

/// Like and comment totals for a post as seen by one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PostCounts {
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone)]
pub struct PostRepository {
    pool: SqlitePool,
}

impl PostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, post_id: &str) -> ServiceResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// Whether the post is shared with a family `user_id` belongs to.
    pub async fn is_shared_with(&self, post_id: &str, user_id: &str) -> ServiceResult<bool> {
        let shared = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM post_families pf
                JOIN family_members fm ON fm.family_id = pf.family_id
                WHERE pf.post_id = ? AND fm.user_id = ?
            )",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(shared)
    }

    /// Family an event belongs to, if the event exists.
    pub async fn event_family(&self, event_id: &str) -> ServiceResult<Option<String>> {
        let family = sqlx::query_scalar("SELECT family_id FROM events WHERE id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(family)
    }

    /// Store a post with its family and event tags, attaching the listed
    /// media. Everything is rolled back unless every media item is an
    /// unattached upload of the post's author.
    pub async fn create(&self, post: &Post, links: PostLinks<'_>) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO posts (id, author_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(&post.created_at)
        .bind(&post.updated_at)
        .execute(&mut *tx)
        .await?;

        for family_id in links.family_ids {
            sqlx::query("INSERT INTO post_families (post_id, family_id) VALUES (?, ?)")
                .bind(&post.id)
                .bind(family_id)
                .execute(&mut *tx)
                .await?;
        }
        for event_id in links.event_ids {
            sqlx::query("INSERT INTO post_events (post_id, event_id) VALUES (?, ?)")
                .bind(&post.id)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
        }
        for media_id in links.media_ids {
            let attached = sqlx::query(
                "UPDATE media SET post_id = ? WHERE id = ? AND uploaded_by_id = ? AND post_id IS NULL",
            )
            .bind(&post.id)
            .bind(media_id)
            .bind(&post.author_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if attached == 0 {
                return Err(ServiceError::bad_request(
                    "Media must be your own upload and not attached to another post",
                ));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Posts shared with any of the user's families, newest first.
    pub async fn feed(&self, user_id: &str, limit: i64, offset: i64) -> ServiceResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT p.id, p.author_id, p.content, p.created_at, p.updated_at
             FROM posts p
             WHERE p.id IN (
                 SELECT pf.post_id FROM post_families pf
                 JOIN family_members fm ON fm.family_id = pf.family_id
                 WHERE fm.user_id = ?
             )
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn update_content(&self, post_id: &str, content: &str, updated_at: &str) -> ServiceResult<()> {
        sqlx::query("UPDATE posts SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(updated_at)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove the post with its likes, comments and tags.
    pub async fn delete(&self, post_id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        delete_post_graph(&mut tx, post_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn author(&self, post: &Post) -> ServiceResult<Option<UserSummary>> {
        let author = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, first_name, last_name, profile_picture FROM users WHERE id = ?",
        )
        .bind(&post.author_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(author)
    }

    pub async fn family_ids(&self, post_id: &str) -> ServiceResult<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT family_id FROM post_families WHERE post_id = ? ORDER BY family_id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn event_ids(&self, post_id: &str) -> ServiceResult<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT event_id FROM post_events WHERE post_id = ? ORDER BY event_id")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn media(&self, post_id: &str) -> ServiceResult<Vec<Media>> {
        let media = sqlx::query_as::<_, Media>(
            "SELECT id, uploaded_by_id, post_id, url, thumb_url, media_type, name, size, mime_type, created_at
             FROM media WHERE post_id = ? ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(media)
    }

    pub async fn counts(&self, post_id: &str, viewer_id: &str) -> ServiceResult<PostCounts> {
        let counts = sqlx::query_as::<_, PostCounts>(
            "SELECT
                (SELECT COUNT(*) FROM likes WHERE post_id = ?1) AS like_count,
                (SELECT COUNT(*) FROM comments WHERE post_id = ?1) AS comment_count,
                EXISTS(SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2) AS liked_by_me",
        )
        .bind(post_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{count_rows, insert_family, insert_user, test_pool};
    use crate::{new_id, timestamp};

    fn post(author: &str) -> Post {
        let now = timestamp();
        Post {
            id: new_id(),
            author_id: author.to_string(),
            content: "hello".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn foreign_media_rolls_back_the_post() {
        let (pool, _dir) = test_pool().await;
        let author = insert_user(&pool, "author@example.com").await;
        let family = insert_family(&pool, &author, "Smiths").await;
        let repo = PostRepository::new(pool.clone());

        let families = vec![family];
        let missing = vec![new_id()];
        let error = repo
            .create(
                &post(&author),
                PostLinks {
                    family_ids: &families,
                    media_ids: &missing,
                    ..PostLinks::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest(_)));
        assert_eq!(count_rows(&pool, "posts").await, 0);
        assert_eq!(count_rows(&pool, "post_families").await, 0);
    }

    #[tokio::test]
    async fn shared_posts_are_visible_to_family_members_only() {
        let (pool, _dir) = test_pool().await;
        let author = insert_user(&pool, "author@example.com").await;
        let stranger = insert_user(&pool, "stranger@example.com").await;
        let family = insert_family(&pool, &author, "Smiths").await;
        let repo = PostRepository::new(pool);

        let record = post(&author);
        let families = vec![family.clone()];
        repo.create(
            &record,
            PostLinks {
                family_ids: &families,
                ..PostLinks::default()
            },
        )
        .await
        .unwrap();

        assert!(repo.is_shared_with(&record.id, &author).await.unwrap());
        assert!(!repo.is_shared_with(&record.id, &stranger).await.unwrap());
        assert_eq!(repo.family_ids(&record.id).await.unwrap(), families);
        assert_eq!(
            repo.counts(&record.id, &author).await.unwrap(),
            PostCounts {
                like_count: 0,
                comment_count: 0,
                liked_by_me: false,
            }
        );
    }
}
