//! Posts and their family, event and media associations.

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use tracing::info;

use kinnect_database::membership::find_membership;
use kinnect_database::repos::PostLinks;
use kinnect_database::{new_id, timestamp, Post, PostRepository, ServiceError, ServiceResult};

use super::{load_post, visible_post};
use crate::types::{FeedPage, NewPost, PostDetails};

#[derive(Clone)]
pub struct PostService {
    pool: SqlitePool,
    post_repository: PostRepository,
}

impl PostService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            post_repository: PostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Publish a post to the given families. The author must be allowed to
    /// post in every one of them; tagged events must belong to those
    /// families and attached media must be the author's own unattached uploads.
    pub async fn create(&self, author_id: &str, input: NewPost) -> ServiceResult<PostDetails> {
        let family_ids = dedupe(&input.family_ids);
        let event_ids = dedupe(&input.event_ids);
        let media_ids = dedupe(&input.media_ids);

        if family_ids.is_empty() {
            return Err(ServiceError::bad_request("A post must be shared with at least one family"));
        }

        for family_id in &family_ids {
            let member = find_membership(&self.pool, family_id, author_id)
                .await?
                .ok_or_else(|| ServiceError::forbidden("You are not a member of every selected family"))?;
            if !member.can(|p| p.can_post) {
                return Err(ServiceError::forbidden("You do not have permission to post in this family"));
            }
        }

        for event_id in &event_ids {
            match self.post_repository.event_family(event_id).await? {
                Some(family_id) if family_ids.contains(&family_id) => {}
                Some(_) => {
                    return Err(ServiceError::bad_request(
                        "Tagged events must belong to one of the selected families",
                    ))
                }
                None => return Err(ServiceError::bad_request("Tagged event does not exist")),
            }
        }

        let now = timestamp();
        let post = Post {
            id: new_id(),
            author_id: author_id.to_string(),
            content: input.content.trim().to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.post_repository
            .create(
                &post,
                PostLinks {
                    family_ids: &family_ids,
                    event_ids: &event_ids,
                    media_ids: &media_ids,
                },
            )
            .await?;

        info!(
            post_id = %post.id,
            author_id,
            families = family_ids.len(),
            events = event_ids.len(),
            media = media_ids.len(),
            "created post"
        );
        self.details(post, author_id).await
    }

    /// Posts shared with any of the viewer's families, newest first.
    pub async fn feed(&self, user_id: &str, page: FeedPage) -> ServiceResult<Vec<PostDetails>> {
        let posts = self.post_repository.feed(user_id, page.limit, page.offset).await?;

        let mut feed = Vec::with_capacity(posts.len());
        for post in posts {
            feed.push(self.details(post, user_id).await?);
        }
        Ok(feed)
    }

    pub async fn get(&self, post_id: &str, user_id: &str) -> ServiceResult<PostDetails> {
        let post = visible_post(&self.post_repository, post_id, user_id).await?;
        self.details(post, user_id).await
    }

    pub async fn update(&self, post_id: &str, user_id: &str, content: &str) -> ServiceResult<PostDetails> {
        let post = load_post(&self.post_repository, post_id).await?;
        if post.author_id != user_id {
            return Err(ServiceError::forbidden("Only the author can edit this post"));
        }

        self.post_repository
            .update_content(post_id, content.trim(), &timestamp())
            .await?;

        info!(post_id, user_id, "updated post");
        let post = load_post(&self.post_repository, post_id).await?;
        self.details(post, user_id).await
    }

    pub async fn delete(&self, post_id: &str, user_id: &str) -> ServiceResult<()> {
        let post = load_post(&self.post_repository, post_id).await?;
        if post.author_id != user_id {
            return Err(ServiceError::forbidden("Only the author can delete this post"));
        }

        self.post_repository.delete(post_id).await?;

        info!(post_id, user_id, "deleted post");
        Ok(())
    }

    async fn details(&self, post: Post, viewer_id: &str) -> ServiceResult<PostDetails> {
        let repo = &self.post_repository;
        let author = repo
            .author(&post)
            .await?
            .ok_or_else(|| ServiceError::not_found("Author"))?;
        let family_ids = repo.family_ids(&post.id).await?;
        let event_ids = repo.event_ids(&post.id).await?;
        let media = repo.media(&post.id).await?;
        let counts = repo.counts(&post.id, viewer_id).await?;

        Ok(PostDetails {
            post,
            author,
            family_ids,
            event_ids,
            media,
            like_count: counts.like_count,
            comment_count: counts.comment_count,
            liked_by_me: counts.liked_by_me,
        })
    }
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}
