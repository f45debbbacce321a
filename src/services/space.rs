//! RAG spaces: named collections of embedded documents.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::space::{CreateSpace, Space};
use crate::services::rag;

/// List spaces, newest first.
pub async fn list(pool: &PgPool, pagination: &Pagination) -> Result<PagedResult<Space>, AppError> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM spaces")
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, Space>(
        "SELECT id, name, created_at FROM spaces ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(items, total, pagination))
}

pub async fn create(pool: &PgPool, input: &CreateSpace) -> Result<Space, AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Space name must not be blank".to_string()));
    }

    let space = sqlx::query_as::<_, Space>(
        "INSERT INTO spaces (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;

    tracing::info!(space_id = %space.id, name = %space.name, "Created space");
    Ok(space)
}

/// Delete a space and every document stored in it.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM spaces WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Space not found".to_string()));
    }

    rag::delete_from_space(pool, &id.to_string()).await?;
    tracing::info!(space_id = %id, "Deleted space");
    Ok(())
}
