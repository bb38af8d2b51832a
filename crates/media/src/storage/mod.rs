//! Object storage for uploaded media.
//!
//! Keys follow `{userId}/{fileType}/{timestamp}-{filename}`; thumbnails live
//! under `{userId}/thumbnails/`. Every backend can turn the public URL it
//! handed out back into the key, which is how deletions find their objects.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use kinnect_config::{StorageBackend, StorageConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use kinnect_database::MediaType;

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store request failed: {0}")]
    Backend(String),

    #[error("storage backend not available: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key` and return the public URL of the object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError>;

    /// Remove the object. Removing a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Recover the key from a URL previously returned by `put`.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// Build the configured backend.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Local => {
            let store = LocalStore::new(&config.local_root, config.public_base_url.clone());
            info!(root = %config.local_root, "using local object storage");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let store = S3Store::from_config(config).await?;
            info!(bucket = %store.bucket(), region = %config.region, "using s3 object storage");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(StorageError::Unavailable(
            "built without the `s3` feature".to_string(),
        )),
    }
}

/// Delete the object behind `url`. URLs that do not map to a key are skipped.
pub async fn delete_by_url(store: &dyn ObjectStore, url: &str) -> Result<(), StorageError> {
    match store.key_from_url(url) {
        Some(key) => store.delete(&key).await,
        None => {
            warn!(url, "no storage key for url, skipping delete");
            Ok(())
        }
    }
}

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid filename regex"));

const MAX_FILENAME_LEN: usize = 100;

/// Reduce an arbitrary client filename to a key-safe one.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        return "file".to_string();
    }

    let mut end = cleaned.len().min(MAX_FILENAME_LEN);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    cleaned[..end].to_string()
}

pub fn object_key(user_id: &str, media_type: MediaType, timestamp_ms: i64, file_name: &str) -> String {
    format!(
        "{user_id}/{}/{timestamp_ms}-{}",
        media_type.as_str(),
        sanitize_filename(file_name)
    )
}

pub fn thumbnail_key(user_id: &str, timestamp_ms: i64, file_name: &str) -> String {
    let safe = sanitize_filename(file_name);
    let stem = match safe.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => safe.as_str(),
    };
    format!("{user_id}/thumbnails/{timestamp_ms}-{stem}.jpg")
}

/// Reject keys that could escape a storage root.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
