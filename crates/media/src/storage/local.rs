use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use super::{validate_key, ObjectStore, StorageError};

const DEFAULT_BASE_URL: &str = "/uploads";

/// Files on local disk, served by the gateway under the public base URL.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    base_url: String,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &body).await?;

        debug!(key, bytes = body.len(), "stored object on disk");
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(key, "object already absent");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_writes_file_and_returns_url() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), None);

        let url = store
            .put("u1/image/1-a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert_eq!(url, "/uploads/u1/image/1-a.png");
        assert_eq!(std::fs::read(dir.path().join("u1/image/1-a.png")).unwrap(), b"png");
        assert_eq!(store.key_from_url(&url).as_deref(), Some("u1/image/1-a.png"));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_objects() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), Some("https://cdn.example/media/".into()));

        store.delete("u1/image/never-written.png").await.unwrap();
    }

    #[test]
    fn foreign_urls_have_no_key() {
        let store = LocalStore::new("/tmp/unused", Some("https://cdn.example/media".into()));

        assert_eq!(
            store.key_from_url("https://cdn.example/media/u1/video/3-b.mp4").as_deref(),
            Some("u1/video/3-b.mp4")
        );
        assert!(store.key_from_url("https://other.example/u1/video/3-b.mp4").is_none());
        assert!(store.key_from_url("https://cdn.example/media/../escape").is_none());
    }
}
