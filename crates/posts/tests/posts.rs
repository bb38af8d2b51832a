//! Posts, comments and likes against a migrated database.

use sqlx::SqlitePool;

use kinnect_database::testing::{add_member, count_rows, insert_family, insert_user, test_pool};
use kinnect_database::{new_id, MemberRole, ServiceError};
use kinnect_posts::{
    CommentService, FeedPage, LikeService, NewComment, NewPost, PostService, MAX_REPLY_DEPTH,
};

async fn insert_event(pool: &SqlitePool, family_id: &str, creator: &str) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO events (id, family_id, created_by, title, start_time, created_at, updated_at)
         VALUES (?, ?, ?, 'Reunion', '2030-01-01T00:00:00+00:00', 'now', 'now')",
    )
    .bind(&id)
    .bind(family_id)
    .bind(creator)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn insert_media(pool: &SqlitePool, uploader: &str) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO media (id, uploaded_by_id, url, media_type, name, size, mime_type, created_at)
         VALUES (?, ?, '/uploads/x.png', 'image', 'x.png', 10, 'image/png', 'now')",
    )
    .bind(&id)
    .bind(uploader)
    .execute(pool)
    .await
    .unwrap();
    id
}

fn post_to(family_id: &str, content: &str) -> NewPost {
    NewPost {
        content: content.to_string(),
        family_ids: vec![family_id.to_string()],
        ..NewPost::default()
    }
}

#[tokio::test]
async fn creating_a_post_links_families_events_and_media() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    let event = insert_event(&pool, &family, &author).await;
    let media = insert_media(&pool, &author).await;

    let service = PostService::new(pool.clone());
    let post = service
        .create(
            &author,
            NewPost {
                content: "  Reunion photos  ".to_string(),
                family_ids: vec![family.clone(), family.clone()],
                event_ids: vec![event.clone()],
                media_ids: vec![media.clone()],
            },
        )
        .await
        .unwrap();

    assert_eq!(post.post.content, "Reunion photos");
    assert_eq!(post.family_ids, vec![family]);
    assert_eq!(post.event_ids, vec![event]);
    assert_eq!(post.media.len(), 1);
    assert_eq!(post.media[0].post_id.as_deref(), Some(post.post.id.as_str()));
    assert_eq!(post.author.first_name, "author");
}

#[tokio::test]
async fn posting_requires_membership_in_every_family() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let stranger = insert_user(&pool, "stranger@example.com").await;
    let mine = insert_family(&pool, &author, "Mine").await;
    let theirs = insert_family(&pool, &stranger, "Theirs").await;

    let service = PostService::new(pool.clone());
    let error = service
        .create(
            &author,
            NewPost {
                content: "hello".to_string(),
                family_ids: vec![mine, theirs],
                ..NewPost::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ServiceError::Forbidden(_)));
    assert_eq!(count_rows(&pool, "posts").await, 0);
}

#[tokio::test]
async fn foreign_media_rolls_back_the_whole_post() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let other = insert_user(&pool, "other@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    let foreign = insert_media(&pool, &other).await;

    let service = PostService::new(pool.clone());
    let mut input = post_to(&family, "not mine");
    input.media_ids = vec![foreign];
    let error = service.create(&author, input).await.unwrap_err();

    assert!(matches!(error, ServiceError::BadRequest(_)));
    assert_eq!(count_rows(&pool, "posts").await, 0);
    assert_eq!(count_rows(&pool, "post_families").await, 0);
}

#[tokio::test]
async fn events_from_other_families_are_rejected() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let first = insert_family(&pool, &author, "First").await;
    let second = insert_family(&pool, &author, "Second").await;
    let event = insert_event(&pool, &second, &author).await;

    let service = PostService::new(pool);
    let mut input = post_to(&first, "wrong event");
    input.event_ids = vec![event];

    assert!(matches!(
        service.create(&author, input).await,
        Err(ServiceError::BadRequest(_))
    ));
}

#[tokio::test]
async fn feed_shows_family_posts_newest_first() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let reader = insert_user(&pool, "reader@example.com").await;
    let outsider = insert_user(&pool, "outsider@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    add_member(&pool, &family, &reader, MemberRole::Member).await;

    let service = PostService::new(pool);
    service.create(&author, post_to(&family, "first")).await.unwrap();
    service.create(&author, post_to(&family, "second")).await.unwrap();

    let feed = service.feed(&reader, FeedPage::default()).await.unwrap();
    let contents: Vec<_> = feed.iter().map(|entry| entry.post.content.as_str()).collect();
    assert_eq!(contents, ["second", "first"]);

    let page = service.feed(&reader, FeedPage::new(Some(1), Some(1))).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].post.content, "first");

    assert!(service.feed(&outsider, FeedPage::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn only_the_author_edits_or_deletes() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let reader = insert_user(&pool, "reader@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    add_member(&pool, &family, &reader, MemberRole::Admin).await;

    let service = PostService::new(pool.clone());
    let post = service.create(&author, post_to(&family, "draft")).await.unwrap();

    assert!(matches!(
        service.update(&post.post.id, &reader, "hijacked").await,
        Err(ServiceError::Forbidden(_))
    ));
    let edited = service.update(&post.post.id, &author, "final").await.unwrap();
    assert_eq!(edited.post.content, "final");

    assert!(matches!(
        service.delete(&post.post.id, &reader).await,
        Err(ServiceError::Forbidden(_))
    ));
    service.delete(&post.post.id, &author).await.unwrap();
    assert_eq!(count_rows(&pool, "posts").await, 0);
    assert_eq!(count_rows(&pool, "post_families").await, 0);
}

#[tokio::test]
async fn comments_form_a_thread_and_replies_follow_their_parent() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let reader = insert_user(&pool, "reader@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    add_member(&pool, &family, &reader, MemberRole::Member).await;

    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool.clone());
    let post = posts.create(&author, post_to(&family, "news")).await.unwrap().post;

    let top = comments
        .create(
            &post.id,
            &reader,
            NewComment {
                content: "Congrats!".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();
    comments
        .create(
            &post.id,
            &author,
            NewComment {
                content: "Thanks".to_string(),
                parent_id: Some(top.id.clone()),
            },
        )
        .await
        .unwrap();

    let thread = comments.thread(&post.id, &author).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].author.first_name, "reader");
    assert_eq!(thread[0].replies.len(), 1);
    assert_eq!(thread[0].replies[0].comment.content, "Thanks");

    // The post's author may remove someone else's comment; the reply goes with it.
    comments.delete(&top.id, &author).await.unwrap();
    assert_eq!(count_rows(&pool, "comments").await, 0);
}

#[tokio::test]
async fn replies_must_target_the_same_post() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;

    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool);
    let first = posts.create(&author, post_to(&family, "one")).await.unwrap().post;
    let second = posts.create(&author, post_to(&family, "two")).await.unwrap().post;

    let on_first = comments
        .create(
            &first.id,
            &author,
            NewComment {
                content: "hi".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();

    let error = comments
        .create(
            &second.id,
            &author,
            NewComment {
                content: "misplaced".to_string(),
                parent_id: Some(on_first.id),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::BadRequest(_)));
}

fn reply(content: &str, parent_id: Option<&str>) -> NewComment {
    NewComment {
        content: content.to_string(),
        parent_id: parent_id.map(str::to_string),
    }
}

#[tokio::test]
async fn replies_past_the_depth_limit_become_siblings() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;

    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool);
    let post = posts.create(&author, post_to(&family, "news")).await.unwrap().post;

    let mut chain = Vec::new();
    let mut parent: Option<String> = None;
    for level in 0..MAX_REPLY_DEPTH + 3 {
        let comment = comments
            .create(&post.id, &author, reply(&format!("level {level}"), parent.as_deref()))
            .await
            .unwrap();
        parent = Some(comment.id.clone());
        chain.push(comment);
    }

    let deepest_allowed = &chain[MAX_REPLY_DEPTH - 1].id;
    for comment in &chain[MAX_REPLY_DEPTH..] {
        assert_eq!(comment.parent_id.as_ref(), Some(deepest_allowed));
    }
    assert_eq!(chain[MAX_REPLY_DEPTH - 1].parent_id.as_ref(), Some(&chain[MAX_REPLY_DEPTH - 2].id));
}

#[tokio::test]
async fn deleting_a_comment_removes_arbitrarily_deep_replies() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;

    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool.clone());
    let post = posts.create(&author, post_to(&family, "news")).await.unwrap().post;
    let root = comments
        .create(&post.id, &author, reply("root", None))
        .await
        .unwrap();

    // Stored threads may predate the depth limit; write one straight to the table.
    let mut parent = root.id.clone();
    let mut tx = pool.begin().await.unwrap();
    for _ in 0..1_500 {
        let id = new_id();
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'deep', 'now', 'now')",
        )
        .bind(&id)
        .bind(&post.id)
        .bind(&author)
        .bind(&parent)
        .execute(&mut *tx)
        .await
        .unwrap();
        parent = id;
    }
    tx.commit().await.unwrap();

    let thread = comments.thread(&post.id, &author).await.unwrap();
    assert_eq!(thread.len(), 1);

    comments.delete(&root.id, &author).await.unwrap();
    assert_eq!(count_rows(&pool, "comments").await, 0);
}

#[tokio::test]
async fn strangers_cannot_delete_comments() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let reader = insert_user(&pool, "reader@example.com").await;
    let other = insert_user(&pool, "other@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    add_member(&pool, &family, &reader, MemberRole::Member).await;
    add_member(&pool, &family, &other, MemberRole::Member).await;

    let posts = PostService::new(pool.clone());
    let comments = CommentService::new(pool);
    let post = posts.create(&author, post_to(&family, "news")).await.unwrap().post;
    let comment = comments
        .create(
            &post.id,
            &reader,
            NewComment {
                content: "mine".to_string(),
                parent_id: None,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        comments.delete(&comment.id, &other).await,
        Err(ServiceError::Forbidden(_))
    ));
    comments.delete(&comment.id, &reader).await.unwrap();
}

#[tokio::test]
async fn likes_toggle_and_are_counted() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let reader = insert_user(&pool, "reader@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;
    add_member(&pool, &family, &reader, MemberRole::Member).await;

    let posts = PostService::new(pool.clone());
    let likes = LikeService::new(pool.clone());
    let post = posts.create(&author, post_to(&family, "news")).await.unwrap().post;

    let first = likes.toggle(&post.id, &reader).await.unwrap();
    assert!(first.liked);
    assert_eq!(first.like_count, 1);

    likes.toggle(&post.id, &author).await.unwrap();
    let likers = likes.likers(&post.id, &author).await.unwrap();
    assert_eq!(likers.len(), 2);

    let details = posts.get(&post.id, &reader).await.unwrap();
    assert!(details.liked_by_me);
    assert_eq!(details.like_count, 2);

    let undone = likes.toggle(&post.id, &reader).await.unwrap();
    assert!(!undone.liked);
    assert_eq!(undone.like_count, 1);
}

#[tokio::test]
async fn outsiders_cannot_like_or_read() {
    let (pool, _dir) = test_pool().await;
    let author = insert_user(&pool, "author@example.com").await;
    let outsider = insert_user(&pool, "outsider@example.com").await;
    let family = insert_family(&pool, &author, "Smiths").await;

    let posts = PostService::new(pool.clone());
    let likes = LikeService::new(pool);
    let post = posts.create(&author, post_to(&family, "private")).await.unwrap().post;

    assert!(matches!(
        posts.get(&post.id, &outsider).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        likes.toggle(&post.id, &outsider).await,
        Err(ServiceError::Forbidden(_))
    ));
}
