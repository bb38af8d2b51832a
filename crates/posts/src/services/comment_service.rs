//! Threaded comments on posts.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::info;

use kinnect_database::graph::delete_comment_graph;
use kinnect_database::{new_id, timestamp, Comment, PostRepository, ServiceError, ServiceResult};

use super::{load_post, visible_post};
use crate::types::{CommentNode, NewComment};

const COMMENT_COLUMNS: &str = "id, post_id, author_id, parent_id, content, created_at, updated_at";

/// Deepest nesting level of a reply; top-level comments sit at level 0.
/// Replying below it attaches the reply next to its would-be parent instead.
pub const MAX_REPLY_DEPTH: usize = 5;

#[derive(Clone)]
pub struct CommentService {
    pool: SqlitePool,
    post_repository: PostRepository,
}

impl CommentService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            post_repository: PostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Comment on a post the user can see. Replies must stay within the same
    /// post and are flattened once they reach [`MAX_REPLY_DEPTH`].
    pub async fn create(&self, post_id: &str, user_id: &str, input: NewComment) -> ServiceResult<Comment> {
        visible_post(&self.post_repository, post_id, user_id).await?;

        let parent_id = match &input.parent_id {
            Some(parent_id) => Some(self.reply_parent(post_id, parent_id).await?),
            None => None,
        };

        let id = new_id();
        let now = timestamp();
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(post_id)
        .bind(user_id)
        .bind(&parent_id)
        .bind(input.content.trim())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(comment_id = %id, post_id, user_id, reply = parent_id.is_some(), "added comment");
        self.load(&id).await
    }

    /// The comment a reply to `parent_id` is stored under.
    async fn reply_parent(&self, post_id: &str, parent_id: &str) -> ServiceResult<String> {
        // Nearest first: the parent, its parent, and so on up to the top-level comment.
        let ancestors: Vec<(String, String)> = sqlx::query_as(
            "WITH RECURSIVE ancestors(id, post_id, parent_id, level) AS (
                 SELECT id, post_id, parent_id, 0 FROM comments WHERE id = ?
                 UNION ALL
                 SELECT c.id, c.post_id, c.parent_id, a.level + 1
                 FROM comments c JOIN ancestors a ON c.id = a.parent_id
             )
             SELECT id, post_id FROM ancestors ORDER BY level",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        match ancestors.first() {
            Some((_, parent_post)) if parent_post == post_id => {}
            _ => return Err(ServiceError::bad_request("Parent comment does not belong to this post")),
        }

        let chain: Vec<String> = ancestors.into_iter().map(|(id, _)| id).collect();
        Ok(capped_parent(&chain).to_string())
    }

    /// Top-level comments, oldest first, each with its replies nested below it.
    pub async fn thread(&self, post_id: &str, user_id: &str) -> ServiceResult<Vec<CommentNode>> {
        visible_post(&self.post_repository, post_id, user_id).await?;

        let comments = sqlx::query_as::<_, CommentNode>(
            "SELECT c.id, c.post_id, c.author_id, c.parent_id, c.content, c.created_at, c.updated_at,
                    u.username, u.first_name, u.last_name, u.profile_picture
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?
             ORDER BY c.created_at, c.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(build_tree(comments))
    }

    /// The comment's author or the post's author may delete. Replies go with it.
    pub async fn delete(&self, comment_id: &str, user_id: &str) -> ServiceResult<()> {
        let comment = self.load(comment_id).await?;
        if comment.author_id != user_id {
            let post = load_post(&self.post_repository, &comment.post_id).await?;
            if post.author_id != user_id {
                return Err(ServiceError::forbidden("You cannot delete this comment"));
            }
        }

        let mut tx = self.pool.begin().await?;
        let removed = delete_comment_graph(&mut tx, comment_id).await?;
        tx.commit().await?;

        info!(comment_id, user_id, removed, "deleted comment");
        Ok(())
    }

    async fn load(&self, comment_id: &str) -> ServiceResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"))
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Comment"))
    }
}

/// Where a reply lands given its parent's ancestry, nearest first. A parent
/// already at [`MAX_REPLY_DEPTH`] hands the reply to its deepest allowed ancestor.
fn capped_parent(chain: &[String]) -> &str {
    let parent_depth = chain.len().saturating_sub(1);
    if parent_depth < MAX_REPLY_DEPTH {
        &chain[0]
    } else {
        &chain[chain.len() - MAX_REPLY_DEPTH]
    }
}

/// Nest a flat, chronologically ordered list by `parent_id`.
///
/// Threads stored deeper than [`MAX_REPLY_DEPTH`] are folded back to that
/// depth, so the result stays shallow whatever the table holds.
fn build_tree(comments: Vec<CommentNode>) -> Vec<CommentNode> {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut roots = Vec::new();
    let mut nodes: HashMap<String, CommentNode> = HashMap::with_capacity(comments.len());
    for comment in comments {
        let id = comment.comment.id.clone();
        match &comment.comment.parent_id {
            Some(parent) => children.entry(parent.clone()).or_default().push(id.clone()),
            None => roots.push(id.clone()),
        }
        nodes.insert(id, comment);
    }

    // Preorder walk assigning each comment the parent it is shown under.
    let mut placed: Vec<(String, Option<String>)> = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(String, Option<String>, usize)> =
        roots.into_iter().rev().map(|id| (id, None, 0)).collect();
    while let Some((id, parent, depth)) = stack.pop() {
        if let Some(kids) = children.get(&id) {
            let (kid_parent, kid_depth) = if depth < MAX_REPLY_DEPTH {
                (Some(id.clone()), depth + 1)
            } else {
                (parent.clone(), depth)
            };
            stack.extend(kids.iter().rev().map(|kid| (kid.clone(), kid_parent.clone(), kid_depth)));
        }
        placed.push((id, parent));
    }

    // Children come after their parent in preorder, so walking backwards
    // completes every subtree before it is moved into its parent.
    let mut tree = Vec::new();
    for (id, parent) in placed.into_iter().rev() {
        let Some(mut node) = nodes.remove(&id) else {
            continue;
        };
        node.replies.reverse();
        match parent.and_then(|parent| nodes.get_mut(&parent)) {
            Some(parent) => parent.replies.push(node),
            None => tree.push(node),
        }
    }
    tree.reverse();
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinnect_database::UserSummary;

    fn node(id: &str, parent: Option<&str>) -> CommentNode {
        CommentNode {
            comment: Comment {
                id: id.to_string(),
                post_id: "p".to_string(),
                author_id: "u".to_string(),
                parent_id: parent.map(str::to_string),
                content: id.to_string(),
                created_at: "now".to_string(),
                updated_at: "now".to_string(),
            },
            author: UserSummary {
                id: "u".to_string(),
                username: None,
                first_name: "U".to_string(),
                last_name: "Ser".to_string(),
                profile_picture: None,
            },
            replies: Vec::new(),
        }
    }

    #[test]
    fn nests_replies_under_their_parents() {
        let tree = build_tree(vec![
            node("a", None),
            node("b", None),
            node("a1", Some("a")),
            node("a1x", Some("a1")),
            node("b1", Some("b")),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, "a");
        assert_eq!(tree[0].replies[0].comment.id, "a1");
        assert_eq!(tree[0].replies[0].replies[0].comment.id, "a1x");
        assert_eq!(tree[1].replies[0].comment.id, "b1");
    }

    #[test]
    fn orphaned_replies_are_dropped() {
        let tree = build_tree(vec![node("a", None), node("x", Some("missing"))]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    fn depth(tree: &[CommentNode]) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&CommentNode, usize)> = tree.iter().map(|n| (n, 0)).collect();
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.replies.iter().map(|reply| (reply, level + 1)));
        }
        deepest
    }

    #[test]
    fn keeps_chronological_order_among_siblings() {
        let tree = build_tree(vec![
            node("a", None),
            node("a1", Some("a")),
            node("a2", Some("a")),
            node("a3", Some("a")),
        ]);
        let ids: Vec<&str> = tree[0].replies.iter().map(|r| r.comment.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2", "a3"]);
    }

    #[test]
    fn very_deep_threads_are_folded_to_the_depth_limit() {
        let mut comments = vec![node("c0", None)];
        for level in 1..20_000 {
            let parent = format!("c{}", level - 1);
            comments.push(node(&format!("c{level}"), Some(&parent)));
        }

        let tree = build_tree(comments);

        assert_eq!(tree.len(), 1);
        assert_eq!(depth(&tree), MAX_REPLY_DEPTH);

        let mut deepest = &tree[0];
        for _ in 0..MAX_REPLY_DEPTH - 1 {
            deepest = &deepest.replies[0];
        }
        assert_eq!(deepest.comment.id, format!("c{}", MAX_REPLY_DEPTH - 1));
        assert_eq!(deepest.replies.len(), 20_000 - MAX_REPLY_DEPTH);
        assert!(serde_json::to_string(&tree).is_ok());
    }

    #[test]
    fn replies_below_the_limit_attach_to_the_deepest_allowed_ancestor() {
        let chain = |len: usize| -> Vec<String> { (0..len).rev().map(|d| format!("d{d}")).collect() };

        assert_eq!(capped_parent(&chain(1)), "d0");
        assert_eq!(capped_parent(&chain(MAX_REPLY_DEPTH)), format!("d{}", MAX_REPLY_DEPTH - 1));
        assert_eq!(capped_parent(&chain(MAX_REPLY_DEPTH + 1)), format!("d{}", MAX_REPLY_DEPTH - 1));
        assert_eq!(capped_parent(&chain(MAX_REPLY_DEPTH + 40)), format!("d{}", MAX_REPLY_DEPTH - 1));
    }
}
