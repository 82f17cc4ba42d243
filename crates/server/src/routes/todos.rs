use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    pagination::PaginatedResponse,
    todo::{CreateTodo, PopulatedTodo, Todo, TodoStats, UpdateTodo},
    todo_query::TodoListQuery,
};
use serde::Deserialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::{AppState, error::ApiError, http::auth::OwnerId, response::ApiResponse};

#[derive(Debug, Default, Deserialize, TS)]
#[ts(export)]
pub struct DeleteTodoQuery {
    pub expected_version: Option<i32>,
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Json(payload): Json<CreateTodo>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Todo>>), ApiError> {
    let todo = state.todos().create_todo(owner.as_str(), payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(todo))))
}

pub async fn get_todos(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Query(query): Query<TodoListQuery>,
) -> Result<ResponseJson<ApiResponse<PaginatedResponse<PopulatedTodo>>>, ApiError> {
    let page = state.todos().list_todos(owner.as_str(), query).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_todo_stats(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<ResponseJson<ApiResponse<TodoStats>>, ApiError> {
    let stats = state.todos().stats(owner.as_str()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PopulatedTodo>>, ApiError> {
    let todo = state.todos().get_todo(owner.as_str(), id).await?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodo>,
) -> Result<ResponseJson<ApiResponse<Todo>>, ApiError> {
    let todo = state.todos().update_todo(owner.as_str(), id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteTodoQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .todos()
        .delete_todo(owner.as_str(), id, query.expected_version)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    let todos_router = Router::new()
        .route("/", get(get_todos).post(create_todo))
        .route("/stats", get(get_todo_stats))
        .route(
            "/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        );

    Router::new().nest("/todos", todos_router)
}
