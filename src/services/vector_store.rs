//! pgvector-backed document store with JSONB metadata filtering.

use pgvector::Vector;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::document::{meta, NewChunk, RagDocument};

/// Metadata predicate: every set field must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub space: Option<String>,
    pub doc: Option<String>,
    pub chunk: Option<String>,
}

impl DocumentFilter {
    pub fn space(space: &str) -> Self {
        Self {
            space: Some(space.to_string()),
            ..Self::default()
        }
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn chunk(mut self, chunk: &str) -> Self {
        self.chunk = Some(chunk.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.space.is_none() && self.doc.is_none() && self.chunk.is_none()
    }

    /// Metadata keys and values of the set fields, in binding order.
    fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            (meta::SPACE, self.space.as_deref()),
            (meta::DOC, self.doc.as_deref()),
            (meta::CHUNK, self.chunk.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// `WHERE` clause whose placeholders start at `$first_param`, or an empty
    /// string for an empty filter.
    fn where_clause(&self, first_param: u32) -> String {
        let conditions: Vec<String> = self
            .fields()
            .iter()
            .enumerate()
            .map(|(i, (key, _))| format!("metadata ->> '{key}' = ${}", first_param + i as u32))
            .collect();
        if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        }
    }
}

/// Insert chunks with their embeddings in one transaction.
pub async fn add(pool: &PgPool, chunks: &[NewChunk]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO vector_store (id, content, metadata, embedding) VALUES ($1, $2, $3, $4)",
        )
        .bind(chunk.id)
        .bind(&chunk.content)
        .bind(&chunk.metadata)
        .bind(Vector::from(chunk.embedding.clone()))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Nearest chunks by cosine distance, restricted by `filter`.
pub async fn similarity_search(
    pool: &PgPool,
    embedding: &[f32],
    top_k: i64,
    filter: &DocumentFilter,
) -> Result<Vec<RagDocument>, AppError> {
    let sql = format!(
        "SELECT id, content, metadata, 1 - (embedding <=> $1) AS score \
         FROM vector_store {} ORDER BY embedding <=> $1 LIMIT {}",
        filter.where_clause(2),
        top_k.max(1)
    );

    let mut query =
        sqlx::query_as::<_, RagDocument>(&sql).bind(Vector::from(embedding.to_vec()));
    for (_, value) in filter.fields() {
        query = query.bind(value);
    }
    Ok(query.fetch_all(pool).await?)
}

/// Chunks matching `filter` in insertion order, without similarity ranking.
pub async fn list(
    pool: &PgPool,
    filter: &DocumentFilter,
    limit: i64,
) -> Result<Vec<RagDocument>, AppError> {
    let sql = format!(
        "SELECT id, content, metadata, NULL::float8 AS score \
         FROM vector_store {} ORDER BY created_at ASC LIMIT {}",
        filter.where_clause(1),
        limit.max(1)
    );

    let mut query = sqlx::query_as::<_, RagDocument>(&sql);
    for (_, value) in filter.fields() {
        query = query.bind(value);
    }
    Ok(query.fetch_all(pool).await?)
}

/// Delete every chunk matching `filter`. An empty filter is rejected.
pub async fn delete_where(pool: &PgPool, filter: &DocumentFilter) -> Result<u64, AppError> {
    if filter.is_empty() {
        return Err(AppError::Validation(
            "Refusing to delete documents without a filter".to_string(),
        ));
    }
    let sql = format!("DELETE FROM vector_store {}", filter.where_clause(1));

    let mut query = sqlx::query(&sql);
    for (_, value) in filter.fields() {
        query = query.bind(value);
    }
    Ok(query.execute(pool).await?.rows_affected())
}
