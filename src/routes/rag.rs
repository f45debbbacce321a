//! RAG document routes: ingestion, listing, search, and deletion.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::Event,
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::document::{AddDocument, DocumentList};
use crate::routes::EventStream;
use crate::services::rag::{self as rag_service, IngestEvent};
use crate::AppState;

/// Listed chunk content is cut to this many characters.
const PREVIEW_CHARS: usize = 3000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_top_k")]
    pub k: i64,
}

fn default_top_k() -> i64 {
    5
}

/// POST /rag/{space}/documents: ingest text, streaming progress as SSE.
pub async fn add(
    State(state): State<AppState>,
    Path(space): Path<String>,
    Json(body): Json<AddDocument>,
) -> Result<EventStream<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("Document text must not be blank".to_string()));
    }

    let progress = rag_service::add(state.db.clone(), state.embedder.clone(), space, body.text);
    let events = progress.map(|event| {
        Ok::<_, Infallible>(match event {
            Ok(IngestEvent::Progress(percent)) => {
                Event::default().event("progress").data(percent.to_string())
            }
            Ok(IngestEvent::Done(done)) => Event::default()
                .event("done")
                .json_data(&done)
                .unwrap_or_else(|e| super::error_event(&AppError::Internal(e.to_string()))),
            Err(e) => super::error_event(&e),
        })
    });

    Ok(super::sse(events))
}

/// GET /rag/{space}/documents: stored chunks with truncated content.
pub async fn list(
    State(state): State<AppState>,
    Path(space): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<DocumentList>>, AppError> {
    let documents = rag_service::list_documents(&state.db, &space, query.limit)
        .await?
        .into_iter()
        .map(|d| d.preview(PREVIEW_CHARS))
        .collect();
    Ok(ApiResponse::success(DocumentList { documents }))
}

/// GET /rag/{space}/search?q=..&k=..
pub async fn search(
    State(state): State<AppState>,
    Path(space): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<DocumentList>>, AppError> {
    if query.q.trim().is_empty() {
        return Err(AppError::Validation("Query must not be blank".to_string()));
    }
    let documents =
        rag_service::search(&state.db, &state.embedder, &space, &query.q, query.k).await?;
    Ok(ApiResponse::success(DocumentList { documents }))
}

/// DELETE /rag/{space}/documents/{doc}: remove every chunk of a document.
pub async fn delete_document(
    State(state): State<AppState>,
    Path((space, doc)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    rag_service::delete_document(&state.db, &space, &doc).await?;
    Ok(ApiResponse::success(()))
}

/// DELETE /rag/{space}/documents/{doc}/chunks/{chunk}
pub async fn delete_chunk(
    State(state): State<AppState>,
    Path((space, doc, chunk)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    rag_service::delete_chunk(&state.db, &space, &doc, &chunk).await?;
    Ok(ApiResponse::success(()))
}
