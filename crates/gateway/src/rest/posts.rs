//! Post, comment and like REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use kinnect_database::{Comment, UserSummary};
use kinnect_posts::{CommentNode, FeedPage, LikeToggle, NewComment, NewPost, PostDetails};

use crate::error::{ApiResponse, ApiResult, ErrorResponse};
use crate::extract::{require_id, AppJson, AppQuery, AuthUser};
use crate::state::GatewayState;
use crate::validation::{Validator, MAX_COMMENT_LENGTH, MAX_POST_LENGTH};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub family_ids: Vec<String>,
    #[serde(default)]
    pub event_ids: Vec<String>,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    /// Defaults to 20, capped at 50.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

pub fn create_post_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", post(create_post))
        .route("/feed", get(get_feed))
        .route("/comments/:comment_id", delete(delete_comment))
        .route("/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/:id/comments", get(list_comments).post(create_comment))
        .route("/:id/like", post(toggle_like))
        .route("/:id/likes", get(list_likes))
}

#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "Posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post published", body = PostDetails),
        (status = 400, description = "Validation failed, foreign event or media", body = ErrorResponse),
        (status = 403, description = "Not allowed to post in a family", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_post(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreatePostRequest>,
) -> ApiResult<(StatusCode, ApiResponse<PostDetails>)> {
    let mut validator = Validator::new();
    validator.length("content", &payload.content, 1, MAX_POST_LENGTH);
    if payload.family_ids.is_empty() {
        validator.error("familyIds", "Select at least one family");
    }
    validator
        .ids("familyIds", &payload.family_ids)
        .ids("eventIds", &payload.event_ids)
        .ids("mediaIds", &payload.media_ids)
        .finish()?;

    let post = state
        .posts
        .create(
            &user.id,
            NewPost {
                content: payload.content,
                family_ids: payload.family_ids,
                event_ids: payload.event_ids,
                media_ids: payload.media_ids,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Post created successfully", post),
    ))
}

#[utoipa::path(
    get,
    path = "/api/posts/feed",
    tag = "Posts",
    params(FeedQuery),
    responses((status = 200, description = "Newest posts from the caller's families", body = Vec<PostDetails>)),
    security(("bearer_auth" = []))
)]
pub async fn get_feed(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<FeedQuery>,
) -> ApiResult<ApiResponse<Vec<PostDetails>>> {
    let page = FeedPage::new(query.limit, query.offset);
    Ok(ApiResponse::ok(state.posts.feed(&user.id, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "The post", body = PostDetails),
        (status = 403, description = "Not shared with the caller", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_post(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<PostDetails>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.posts.get(&id, &user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostDetails),
        (status = 403, description = "Author only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_post(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> ApiResult<ApiResponse<PostDetails>> {
    require_id(&id)?;
    Validator::new()
        .length("content", &payload.content, 1, MAX_POST_LENGTH)
        .finish()?;

    let post = state.posts.update(&id, &user.id, &payload.content).await?;
    Ok(ApiResponse::with_message("Post updated successfully", post))
}

#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post removed with its comments and likes"),
        (status = 403, description = "Author only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_post(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&id)?;
    state.posts.delete(&id, &user.id).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Parent belongs to another post", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Comment>)> {
    require_id(&id)?;
    let mut validator = Validator::new();
    validator.length("content", &payload.content, 1, MAX_COMMENT_LENGTH);
    if let Some(parent_id) = &payload.parent_id {
        validator.id("parentId", parent_id);
    }
    validator.finish()?;

    let comment = state
        .comments
        .create(
            &id,
            &user.id,
            NewComment {
                content: payload.content,
                parent_id: payload.parent_id,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Comment added successfully", comment),
    ))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    responses((status = 200, description = "Top-level comments with nested replies", body = Vec<CommentNode>)),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<CommentNode>>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.comments.thread(&id, &user.id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/posts/comments/{comment_id}",
    tag = "Posts",
    params(("comment_id" = String, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment and its replies removed"),
        (status = 403, description = "Comment or post author only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(comment_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&comment_id)?;
    state.comments.delete(&comment_id, &user.id).await?;
    Ok(ApiResponse::message("Comment deleted successfully"))
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/like",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    responses((status = 200, description = "New like state", body = LikeToggle)),
    security(("bearer_auth" = []))
)]
pub async fn toggle_like(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<LikeToggle>> {
    require_id(&id)?;
    let toggle = state.likes.toggle(&id, &user.id).await?;
    let message = if toggle.liked { "Post liked" } else { "Post unliked" };
    Ok(ApiResponse::with_message(message, toggle))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}/likes",
    tag = "Posts",
    params(("id" = String, Path, description = "Post id")),
    responses((status = 200, description = "Users who liked the post", body = Vec<UserSummary>)),
    security(("bearer_auth" = []))
)]
pub async fn list_likes(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<UserSummary>>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.likes.likers(&id, &user.id).await?))
}
