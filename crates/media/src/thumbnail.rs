//! Thumbnail rendering for uploaded images.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

/// Longest edge of a generated thumbnail, in pixels.
pub const THUMBNAIL_MAX_DIMENSION: u32 = 300;

const JPEG_QUALITY: u8 = 80;

const THUMBNAIL_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/pjpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("thumbnail worker failed: {0}")]
    Worker(String),
}

pub fn supports_thumbnail(mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    THUMBNAIL_MIME_TYPES.contains(&mime.as_str())
}

/// Decode `source`, fit it inside the thumbnail box and encode it as JPEG.
pub fn render_thumbnail(source: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let decoded = image::load_from_memory(source)?;
    let resized = decoded
        .thumbnail(THUMBNAIL_MAX_DIMENSION, THUMBNAIL_MAX_DIMENSION)
        .to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&resized)?;
    Ok(encoded)
}

/// Render on the blocking pool so decoding never stalls the async workers.
pub async fn generate_thumbnail(source: Bytes) -> Result<Vec<u8>, ThumbnailError> {
    tokio::task::spawn_blocking(move || render_thumbnail(&source))
        .await
        .map_err(|error| ThumbnailError::Worker(error.to_string()))?
}
