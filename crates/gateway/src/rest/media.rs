//! Media upload REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::debug;
use utoipa::ToSchema;

use kinnect_database::Media;
use kinnect_media::UploadedFile;

use crate::error::{ApiError, ApiResponse, ApiResult, ErrorResponse};
use crate::extract::{require_id, AuthUser};
use crate::state::GatewayState;

const FILE_FIELD: &str = "file";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Multipart form accepted by the upload endpoint.
#[derive(Debug, ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

pub fn create_media_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(list_media))
        .route("/upload", post(upload_media))
        .route("/:id", get(get_media).delete(delete_media))
}

#[utoipa::path(
    post,
    path = "/api/media/upload",
    tag = "Media",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored; thumbUrl is null unless a thumbnail was rendered", body = Media),
        (status = 400, description = "No file or an empty file", body = ErrorResponse),
        (status = 413, description = "File is too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_media(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, ApiResponse<Media>)> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "skipping multipart field");
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await?;
        upload = Some(UploadedFile {
            file_name,
            content_type,
            data,
        });
        break;
    }

    let file = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if file.data.len() > state.config.storage.max_upload_bytes {
        return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "File is too large"));
    }
    let media = state.media.upload(&user.id, file).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("File uploaded successfully", media),
    ))
}

#[utoipa::path(
    get,
    path = "/api/media",
    tag = "Media",
    responses((status = 200, description = "The caller's uploads, newest first", body = Vec<Media>)),
    security(("bearer_auth" = []))
)]
pub async fn list_media(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
) -> ApiResult<ApiResponse<Vec<Media>>> {
    Ok(ApiResponse::ok(state.media.list_for_user(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/media/{id}",
    tag = "Media",
    params(("id" = String, Path, description = "Media id")),
    responses(
        (status = 200, description = "The media record", body = Media),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Media not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_media(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Media>> {
    require_id(&id)?;
    Ok(ApiResponse::ok(state.media.get(&id, &user.id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/media/{id}",
    tag = "Media",
    params(("id" = String, Path, description = "Media id")),
    responses(
        (status = 200, description = "Record and stored objects removed"),
        (status = 403, description = "Uploader only", body = ErrorResponse),
        (status = 404, description = "Media not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_media(
    State(state): State<Arc<GatewayState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_id(&id)?;
    state.media.delete(&id, &user.id).await?;
    Ok(ApiResponse::message("Media deleted successfully"))
}
