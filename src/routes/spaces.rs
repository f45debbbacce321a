//! Space routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::space::{CreateSpace, Space};
use crate::services::space as space_service;
use crate::AppState;

/// GET /spaces: newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<Space>>>, AppError> {
    let spaces = space_service::list(&state.db, &pagination).await?;
    Ok(ApiResponse::success(spaces))
}

/// POST /spaces
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateSpace>,
) -> Result<Json<ApiResponse<Space>>, AppError> {
    let space = space_service::create(&state.db, &body).await?;
    Ok(ApiResponse::success(space))
}

/// DELETE /spaces/{id}: also removes the space's documents.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    space_service::delete(&state.db, id).await?;
    Ok(ApiResponse::success(()))
}
