//! Upload, lookup and deletion of media records and their stored objects.

use std::sync::Arc;

use bytes::Bytes;
use sqlx::SqlitePool;
use tracing::{info, warn};

use kinnect_database::{new_id, timestamp, Media, MediaType, ServiceError, ServiceResult};

use crate::storage::{delete_by_url, object_key, thumbnail_key, ObjectStore, StorageError};
use crate::thumbnail::{generate_thumbnail, supports_thumbnail};

/// A file received from a client, before it is stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct MediaService {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
    max_upload_bytes: usize,
}

const MEDIA_COLUMNS: &str =
    "id, uploaded_by_id, post_id, url, thumb_url, media_type, name, size, mime_type, created_at";

impl MediaService {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>, max_upload_bytes: usize) -> Self {
        Self {
            pool,
            store,
            max_upload_bytes,
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Store the file, try to attach a thumbnail, and record the metadata.
    pub async fn upload(&self, uploader_id: &str, file: UploadedFile) -> ServiceResult<Media> {
        if file.data.is_empty() {
            return Err(ServiceError::bad_request("Uploaded file is empty"));
        }
        if file.data.len() > self.max_upload_bytes {
            return Err(ServiceError::bad_request(format!(
                "File exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }

        let content_type = normalize_content_type(&file.content_type);
        let media_type = MediaType::from_mime(&content_type);
        let stamp = chrono::Utc::now().timestamp_millis();
        let key = object_key(uploader_id, media_type, stamp, &file.file_name);

        let url = self
            .store
            .put(&key, file.data.clone(), &content_type)
            .await
            .map_err(ServiceError::storage)?;

        let thumb_url = if media_type == MediaType::Image && supports_thumbnail(&content_type) {
            self.store_thumbnail(uploader_id, stamp, &file).await
        } else {
            None
        };

        let media = Media {
            id: new_id(),
            uploaded_by_id: uploader_id.to_string(),
            post_id: None,
            url,
            thumb_url,
            media_type,
            name: file.file_name.clone(),
            size: file.data.len() as i64,
            mime_type: content_type,
            created_at: timestamp(),
        };

        if let Err(error) = self.insert(&media).await {
            // Do not leave unreferenced objects behind.
            if let Err(cleanup) = remove_objects(self.store.as_ref(), &media).await {
                warn!(media_id = %media.id, error = %cleanup, "failed to clean up objects after insert failure");
            }
            return Err(error);
        }

        info!(
            media_id = %media.id,
            user_id = uploader_id,
            media_type = media.media_type.as_str(),
            size = media.size,
            thumbnail = media.thumb_url.is_some(),
            "stored media upload"
        );
        Ok(media)
    }

    /// Best effort: any failure is logged and yields no thumbnail.
    async fn store_thumbnail(&self, uploader_id: &str, stamp: i64, file: &UploadedFile) -> Option<String> {
        let rendered = match generate_thumbnail(file.data.clone()).await {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(file = %file.file_name, %error, "thumbnail generation failed");
                return None;
            }
        };

        let key = thumbnail_key(uploader_id, stamp, &file.file_name);
        match self.store.put(&key, Bytes::from(rendered), "image/jpeg").await {
            Ok(url) => Some(url),
            Err(error) => {
                warn!(key, %error, "thumbnail upload failed");
                None
            }
        }
    }

    async fn insert(&self, media: &Media) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO media (id, uploaded_by_id, post_id, url, thumb_url, media_type, name, size, mime_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&media.id)
        .bind(&media.uploaded_by_id)
        .bind(&media.post_id)
        .bind(&media.url)
        .bind(&media.thumb_url)
        .bind(media.media_type)
        .bind(&media.name)
        .bind(media.size)
        .bind(&media.mime_type)
        .bind(&media.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Media>> {
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE uploaded_by_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(media)
    }

    async fn find(&self, media_id: &str) -> ServiceResult<Media> {
        sqlx::query_as::<_, Media>(&format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?"))
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Media"))
    }

    /// Visible to the uploader and to members of any family the attached post is shared with.
    pub async fn get(&self, media_id: &str, viewer_id: &str) -> ServiceResult<Media> {
        let media = self.find(media_id).await?;
        if media.uploaded_by_id == viewer_id {
            return Ok(media);
        }

        let Some(post_id) = media.post_id.as_deref() else {
            return Err(ServiceError::forbidden("You do not have access to this media"));
        };

        let shared: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM post_families pf
                JOIN family_members fm ON fm.family_id = pf.family_id
                WHERE pf.post_id = ? AND fm.user_id = ?
            )",
        )
        .bind(post_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;

        if shared {
            Ok(media)
        } else {
            Err(ServiceError::forbidden("You do not have access to this media"))
        }
    }

    /// Remove both stored objects, then the record. Only the uploader may delete.
    pub async fn delete(&self, media_id: &str, user_id: &str) -> ServiceResult<()> {
        let media = self.find(media_id).await?;
        if media.uploaded_by_id != user_id {
            return Err(ServiceError::forbidden("Only the uploader can delete this media"));
        }

        remove_objects(self.store.as_ref(), &media)
            .await
            .map_err(ServiceError::storage)?;

        sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        info!(media_id, user_id, "deleted media");
        Ok(())
    }
}

/// Delete the original and, when present, the thumbnail of a media item.
pub async fn remove_objects(store: &dyn ObjectStore, media: &Media) -> Result<(), StorageError> {
    delete_by_url(store, &media.url).await?;
    if let Some(thumb_url) = &media.thumb_url {
        delete_by_url(store, thumb_url).await?;
    }
    Ok(())
}

fn normalize_content_type(raw: &str) -> String {
    let essence = raw.split(';').next().unwrap_or(raw).trim().to_ascii_lowercase();
    if essence.is_empty() {
        "application/octet-stream".to_string()
    } else {
        essence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;
    use crate::thumbnail::fixtures;
    use kinnect_database::testing::{insert_user, test_pool};

    fn file(name: &str, content_type: &str, data: Vec<u8>) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            data: Bytes::from(data),
        }
    }

    #[test]
    fn content_type_parameters_are_dropped() {
        assert_eq!(normalize_content_type("text/plain; charset=utf-8"), "text/plain");
        assert_eq!(normalize_content_type(""), "application/octet-stream");
    }

    #[tokio::test]
    async fn image_upload_stores_original_and_thumbnail() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "uploader@example.com").await;

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, _, content_type| key.contains("/image/") && content_type == "image/png")
            .times(1)
            .returning(|key, _, _| Ok(format!("/uploads/{key}")));
        store
            .expect_put()
            .withf(|key, _, content_type| key.contains("/thumbnails/") && content_type == "image/jpeg")
            .times(1)
            .returning(|key, _, _| Ok(format!("/uploads/{key}")));

        let service = MediaService::new(pool, Arc::new(store), 1024 * 1024);
        let media = service
            .upload(&user, file("cat.png", "image/png", fixtures::png(64, 32)))
            .await
            .unwrap();

        assert_eq!(media.media_type, MediaType::Image);
        assert!(media.thumb_url.as_deref().unwrap().ends_with("-cat.jpg"));
    }

    #[tokio::test]
    async fn broken_image_still_uploads_without_thumbnail() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "uploader@example.com").await;

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .times(1)
            .returning(|key, _, _| Ok(format!("/uploads/{key}")));

        let service = MediaService::new(pool, Arc::new(store), 1024 * 1024);
        let media = service
            .upload(&user, file("broken.jpg", "image/jpeg", b"not really a jpeg".to_vec()))
            .await
            .unwrap();

        assert!(media.thumb_url.is_none());
    }

    #[tokio::test]
    async fn failed_thumbnail_upload_is_swallowed() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "uploader@example.com").await;

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, _, _| key.contains("/image/"))
            .returning(|key, _, _| Ok(format!("/uploads/{key}")));
        store
            .expect_put()
            .withf(|key, _, _| key.contains("/thumbnails/"))
            .returning(|_, _, _| Err(StorageError::Backend("bucket unavailable".into())));

        let service = MediaService::new(pool, Arc::new(store), 1024 * 1024);
        let media = service
            .upload(&user, file("dog.png", "image/png", fixtures::png(8, 8)))
            .await
            .unwrap();

        assert!(media.thumb_url.is_none());
    }

    #[tokio::test]
    async fn storage_failure_on_original_fails_the_upload() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "uploader@example.com").await;

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .returning(|_, _, _| Err(StorageError::Backend("denied".into())));

        let service = MediaService::new(pool.clone(), Arc::new(store), 1024);
        let error = service
            .upload(&user, file("notes.txt", "text/plain", b"hello".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(error, ServiceError::Storage(_)));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_files() {
        let (pool, _dir) = test_pool().await;
        let service = MediaService::new(pool, Arc::new(MockObjectStore::new()), 4);

        assert!(matches!(
            service.upload("u", file("a.txt", "text/plain", Vec::new())).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            service.upload("u", file("a.txt", "text/plain", b"12345".to_vec())).await,
            Err(ServiceError::BadRequest(_))
        ));
    }
}
