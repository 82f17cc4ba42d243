use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::attachment::Attachment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{AppState, error::ApiError, http::auth::OwnerId, response::ApiResponse};

/// Multipart field holding the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DownloadUrl {
    pub url: String,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("The file part must carry a filename".to_string()))?;
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(todo_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Attachment>>), ApiError> {
    let (filename, body) = read_file_field(&mut multipart).await?;
    let attachment = state
        .attachments()
        .upload_attachment(owner.as_str(), todo_id, &filename, body)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(attachment))))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path((todo_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .attachments()
        .delete_attachment(owner.as_str(), todo_id, attachment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_download_url(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path((todo_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<DownloadUrl>>, ApiError> {
    let url = state
        .attachments()
        .presigned_url(owner.as_str(), todo_id, attachment_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(DownloadUrl { url })))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let body_limit = usize::try_from(state.attachments().max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/todos/{id}/attachments",
            post(upload_attachment).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/todos/{id}/attachments/{attachment_id}",
            delete(delete_attachment),
        )
        .route(
            "/todos/{id}/attachments/{attachment_id}/download",
            get(get_download_url),
        )
}
