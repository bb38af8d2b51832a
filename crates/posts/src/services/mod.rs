//! Post, comment and like services.

pub mod comment_service;
pub mod like_service;
pub mod post_service;

pub use comment_service::{CommentService, MAX_REPLY_DEPTH};
pub use like_service::LikeService;
pub use post_service::PostService;

use kinnect_database::{Post, PostRepository, ServiceError, ServiceResult};

pub(crate) async fn load_post(posts: &PostRepository, post_id: &str) -> ServiceResult<Post> {
    posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Post"))
}

/// Load a post the user may read: their own, or one shared with a family they belong to.
pub(crate) async fn visible_post(posts: &PostRepository, post_id: &str, user_id: &str) -> ServiceResult<Post> {
    let post = load_post(posts, post_id).await?;
    if post.author_id == user_id || posts.is_shared_with(post_id, user_id).await? {
        Ok(post)
    } else {
        Err(ServiceError::forbidden("You do not have access to this post"))
    }
}
