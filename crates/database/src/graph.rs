//! Deletion of an entity together with every row that references it.
//!
//! Each helper runs its statements on the connection it is given, so callers
//! decide the transaction boundary: pass `&mut *tx` to make the removal part of
//! a larger unit of work. Statements are ordered so that foreign keys are never
//! violated mid-way.
//!
//! Comment threads are removed by collecting the subtree first and detaching
//! every parent link before deleting, so no statement depends on the
//! self-referencing cascade, whose depth SQLite caps.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

/// Remove an event, its attendance, its invitations and its post tags.
pub async fn delete_event_graph(
    conn: &mut SqliteConnection,
    event_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM event_attendees WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM event_invitations WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM post_events WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;

    debug!(event_id, "deleted event graph");
    Ok(())
}

/// Remove a post with its likes, comments and tags. Media attached to the
/// post is detached rather than deleted, since it belongs to its uploader.
pub async fn delete_post_graph(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM likes WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE comments SET parent_id = NULL WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM post_families WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM post_events WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE media SET post_id = NULL WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    debug!(post_id, "deleted post graph");
    Ok(())
}

/// Bound parameters per batched statement, below SQLite's variable limit.
const ID_BATCH: usize = 500;

/// Remove a comment and every reply beneath it, however deep. Returns the
/// number of comments removed.
pub async fn delete_comment_graph(
    conn: &mut SqliteConnection,
    comment_id: &str,
) -> Result<u64, sqlx::Error> {
    let removed = delete_comment_subtrees(conn, "id", comment_id).await?;
    debug!(comment_id, removed, "deleted comment graph");
    Ok(removed)
}

/// Remove every comment written by `author_id`, with all replies beneath them.
pub async fn delete_comments_by_author(
    conn: &mut SqliteConnection,
    author_id: &str,
) -> Result<u64, sqlx::Error> {
    let removed = delete_comment_subtrees(conn, "author_id", author_id).await?;
    debug!(author_id, removed, "deleted comments by author");
    Ok(removed)
}

/// `seed_column` is one of our own column names, never caller input.
async fn delete_comment_subtrees(
    conn: &mut SqliteConnection,
    seed_column: &'static str,
    value: &str,
) -> Result<u64, sqlx::Error> {
    let ids: Vec<String> = sqlx::query_scalar(&format!(
        "WITH RECURSIVE subtree(id) AS (
             SELECT id FROM comments WHERE {seed_column} = ?
             UNION
             SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
         )
         SELECT id FROM subtree"
    ))
    .bind(value)
    .fetch_all(&mut *conn)
    .await?;

    // The subtree is closed under replies, so once its own links are cut no
    // remaining row points into it.
    for batch in ids.chunks(ID_BATCH) {
        execute_for_ids(conn, "UPDATE comments SET parent_id = NULL WHERE id IN (", batch).await?;
    }
    let mut removed = 0;
    for batch in ids.chunks(ID_BATCH) {
        removed += execute_for_ids(conn, "DELETE FROM comments WHERE id IN (", batch).await?;
    }
    Ok(removed)
}

async fn execute_for_ids(
    conn: &mut SqliteConnection,
    statement: &str,
    ids: &[String],
) -> Result<u64, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(statement);
    let mut list = query.separated(", ");
    for id in ids {
        list.push_bind(id.as_str());
    }
    list.push_unseparated(")");
    Ok(query.build().execute(&mut *conn).await?.rows_affected())
}

/// Remove a family with its events, post tags and memberships. Posts shared
/// with the family survive; only the association is dropped.
pub async fn delete_family_graph(
    conn: &mut SqliteConnection,
    family_id: &str,
) -> Result<(), sqlx::Error> {
    let event_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM events WHERE family_id = ?")
        .bind(family_id)
        .fetch_all(&mut *conn)
        .await?;

    for event_id in &event_ids {
        delete_event_graph(conn, event_id).await?;
    }

    sqlx::query("DELETE FROM post_families WHERE family_id = ?")
        .bind(family_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM family_members WHERE family_id = ?")
        .bind(family_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM families WHERE id = ?")
        .bind(family_id)
        .execute(&mut *conn)
        .await?;

    debug!(family_id, events = event_ids.len(), "deleted family graph");
    Ok(())
}
