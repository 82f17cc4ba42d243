use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    category::{Category, CategoryListQuery, CreateCategory, UpdateCategory},
    pagination::PaginatedResponse,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, http::auth::OwnerId, response::ApiResponse};

pub async fn create_category(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Json(payload): Json<CreateCategory>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Category>>), ApiError> {
    let category = state
        .categories()
        .create_category(owner.as_str(), payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(category))))
}

pub async fn get_categories(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Query(query): Query<CategoryListQuery>,
) -> Result<ResponseJson<ApiResponse<PaginatedResponse<Category>>>, ApiError> {
    let page = state
        .categories()
        .list_categories(owner.as_str(), query)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    let category = state.categories().get_category(owner.as_str(), id).await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    let category = state
        .categories()
        .update_category(owner.as_str(), id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.categories().delete_category(owner.as_str(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    let categories_router = Router::new()
        .route("/", get(get_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        );

    Router::new().nest("/categories", categories_router)
}
