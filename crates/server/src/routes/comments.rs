use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::comment::{AddComment, Comment, UpdateComment};
use uuid::Uuid;

use crate::{AppState, error::ApiError, http::auth::OwnerId, response::ApiResponse};

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(todo_id): Path<Uuid>,
    Json(payload): Json<AddComment>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Comment>>), ApiError> {
    let comment = state
        .comments()
        .add_comment(owner.as_str(), todo_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(comment))))
}

pub async fn get_comments(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(todo_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Comment>>>, ApiError> {
    let comments = state
        .comments()
        .list_comments(owner.as_str(), todo_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    let comment = state
        .comments()
        .update_comment(owner.as_str(), id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.comments().delete_comment(owner.as_str(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todos/{id}/comments", get(get_comments).post(add_comment))
        .route("/comments/{id}", patch(update_comment).delete(delete_comment))
}
