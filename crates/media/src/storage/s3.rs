use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use kinnect_config::StorageConfig;
use tracing::debug;

use super::{validate_key, ObjectStore, StorageError};

/// Objects in an S3 (or S3-compatible) bucket. Credentials come from the
/// standard AWS provider chain (`AWS_ACCESS_KEY_ID`, profiles, instance roles).
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3Store {
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::Unavailable("storage.bucket is not set".to_string()))?;

        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let base_url = match (&config.public_base_url, &config.endpoint) {
            (Some(base), _) => base.clone(),
            (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", bucket, config.region),
        };

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|error| StorageError::Backend(DisplayErrorContext(&error).to_string()))?;

        debug!(bucket = %self.bucket, key, bytes = size, "uploaded object");
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        // DeleteObject succeeds for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| StorageError::Backend(DisplayErrorContext(&error).to_string()))?;

        debug!(bucket = %self.bucket, key, "deleted object");
        Ok(())
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}
