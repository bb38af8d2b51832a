//! Permanent account removal.
//!
//! Everything the user owns or participated in is removed in one transaction.
//! Families the user created are handed to another admin when one exists and
//! deleted otherwise. Stored objects for the user's media are removed before
//! their rows; a storage failure aborts the whole deletion.

use sqlx::SqliteConnection;
use tracing::{info, warn};

use kinnect_auth::verify_password;
use kinnect_database::graph::{
    delete_comments_by_author, delete_event_graph, delete_family_graph, delete_post_graph,
};
use kinnect_database::{Media, MemberRole, ServiceError, ServiceResult};
use kinnect_media::remove_objects;

use super::user_service::UserService;

/// What happened to the families the deleted user had created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub families_transferred: usize,
    pub families_deleted: usize,
    pub posts_deleted: usize,
    pub media_deleted: usize,
}

impl UserService {
    pub async fn delete_account(&self, user_id: &str, password: &str) -> ServiceResult<DeletionReport> {
        let user = self.get(user_id).await?;
        if !verify_password(password, &user.password_hash).map_err(ServiceError::internal)? {
            return Err(ServiceError::unauthorized("Password is incorrect"));
        }

        let mut tx = self.pool.begin().await?;
        let mut report = DeletionReport::default();

        let created: Vec<String> =
            sqlx::query_scalar("SELECT id FROM families WHERE created_by = ? ORDER BY created_at")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

        for family_id in &created {
            match successor_admin(&mut tx, family_id, user_id).await? {
                Some(successor) => {
                    sqlx::query("UPDATE families SET created_by = ? WHERE id = ?")
                        .bind(&successor)
                        .bind(family_id)
                        .execute(&mut *tx)
                        .await?;
                    info!(family_id, new_owner = %successor, "transferred family ownership");
                    report.families_transferred += 1;
                }
                None => {
                    delete_family_graph(&mut tx, family_id).await?;
                    report.families_deleted += 1;
                }
            }
        }

        sqlx::query("DELETE FROM family_members WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        remove_event_participation(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM likes WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        delete_comments_by_author(&mut tx, user_id).await?;

        let posts: Vec<String> = sqlx::query_scalar("SELECT id FROM posts WHERE author_id = ?")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
        for post_id in &posts {
            delete_post_graph(&mut tx, post_id).await?;
        }
        report.posts_deleted = posts.len();

        let media = sqlx::query_as::<_, Media>(
            "SELECT id, uploaded_by_id, post_id, url, thumb_url, media_type, name, size, mime_type, created_at
             FROM media WHERE uploaded_by_id = ?",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &media {
            if let Err(error) = remove_objects(self.store.as_ref(), item).await {
                warn!(user_id, media_id = %item.id, %error, "aborting account deletion");
                return Err(ServiceError::storage(error));
            }
            sqlx::query("DELETE FROM media WHERE id = ?")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
        }
        report.media_deleted = media.len();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            user_id,
            families_transferred = report.families_transferred,
            families_deleted = report.families_deleted,
            posts = report.posts_deleted,
            media = report.media_deleted,
            "deleted account"
        );
        Ok(report)
    }
}

/// The longest-standing admin other than `leaving_user`.
async fn successor_admin(
    conn: &mut SqliteConnection,
    family_id: &str,
    leaving_user: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT user_id FROM family_members
         WHERE family_id = ? AND user_id != ? AND role = ?
         ORDER BY joined_at, id
         LIMIT 1",
    )
    .bind(family_id)
    .bind(leaving_user)
    .bind(MemberRole::Admin)
    .fetch_optional(conn)
    .await
}

async fn remove_event_participation(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM event_attendees WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM event_invitations WHERE invitee_id = ? OR invited_by = ?")
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let events: Vec<String> = sqlx::query_scalar("SELECT id FROM events WHERE created_by = ?")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    for event_id in &events {
        delete_event_graph(conn, event_id).await?;
    }
    Ok(())
}
