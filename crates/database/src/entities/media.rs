//! Media entity definitions

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::FromRow;

/// Broad classification of an uploaded file, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Document,
    Other,
}

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/rtf",
];

impl MediaType {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaType::Image
        } else if mime.starts_with("video/") {
            MediaType::Video
        } else if mime.starts_with("text/") || DOCUMENT_MIME_TYPES.contains(&mime.as_str()) {
            MediaType::Document
        } else {
            MediaType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub uploaded_by_id: String,
    pub post_id: Option<String>,
    pub url: String,
    pub thumb_url: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: String,
}
