//! Retrieval-augmented generation: document ingestion, search, and prompt context.

use serde_json::json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{meta, IngestedDocument, NewChunk, RagDocument};
use crate::services::chunker;
use crate::services::embedding::SharedEmbedder;
use crate::services::vector_store::{self, DocumentFilter};

const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Progress of a running ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// Percentage of chunks stored so far.
    Progress(u32),
    Done(IngestedDocument),
}

/// Chunk, embed, and store `text` in `space`, reporting progress per chunk.
///
/// Ingestion runs on its own task and finishes even if the receiver is dropped.
pub fn add(
    pool: PgPool,
    embedder: SharedEmbedder,
    space: String,
    text: String,
) -> ReceiverStream<Result<IngestEvent, AppError>> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let doc_id = Uuid::new_v4();
        if let Err(e) = ingest(&pool, &embedder, &space, doc_id, &text, &tx).await {
            tracing::error!(space = %space, doc_id = %doc_id, error = %e, "Document ingestion failed");
            let _ = tx.send(Err(e)).await;
        }
    });

    ReceiverStream::new(rx)
}

async fn ingest(
    pool: &PgPool,
    embedder: &SharedEmbedder,
    space: &str,
    doc_id: Uuid,
    text: &str,
    tx: &mpsc::Sender<Result<IngestEvent, AppError>>,
) -> Result<(), AppError> {
    let chunks = chunker::chunk_for_ingest(text);
    let total = chunks.len();
    tracing::info!(space = %space, doc_id = %doc_id, chunks = total, "Ingesting document");

    for (i, content) in chunks.into_iter().enumerate() {
        let embedding = embedder.embed(&content).await?;
        let chunk_id = Uuid::new_v4();
        let chunk = NewChunk {
            id: chunk_id,
            metadata: json!({
                meta::SPACE: space,
                meta::DOC: doc_id.to_string(),
                meta::CHUNK: chunk_id.to_string(),
                meta::NUMBER: i,
                meta::TOTAL: total,
            }),
            content,
            embedding,
        };
        vector_store::add(pool, std::slice::from_ref(&chunk)).await?;

        // A closed receiver only means nobody is watching.
        let _ = tx
            .send(Ok(IngestEvent::Progress(progress_percent(i, total))))
            .await;
    }

    let _ = tx
        .send(Ok(IngestEvent::Done(IngestedDocument {
            doc_id,
            chunks: total,
        })))
        .await;
    Ok(())
}

/// Whole percent of `total` chunks done after finishing chunk `index`.
pub fn progress_percent(index: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((index + 1) * 100 / total) as u32
}

/// Chunks of `space` most similar to `query`.
pub async fn search(
    pool: &PgPool,
    embedder: &SharedEmbedder,
    space: &str,
    query: &str,
    top_k: i64,
) -> Result<Vec<RagDocument>, AppError> {
    let embedding = embedder.embed(query).await?;
    vector_store::similarity_search(pool, &embedding, top_k, &DocumentFilter::space(space)).await
}

pub async fn list_documents(
    pool: &PgPool,
    space: &str,
    limit: i64,
) -> Result<Vec<RagDocument>, AppError> {
    vector_store::list(pool, &DocumentFilter::space(space), limit).await
}

/// Delete a single chunk by id.
pub async fn delete_from_space(pool: &PgPool, space: &str) -> Result<u64, AppError> {
    let removed = vector_store::delete_where(pool, &DocumentFilter::space(space)).await?;
    tracing::info!(space = %space, removed, "Deleted space documents");
    Ok(removed)
}

pub async fn delete_document(pool: &PgPool, space: &str, doc: &str) -> Result<u64, AppError> {
    let removed = vector_store::delete_where(pool, &DocumentFilter::space(space).doc(doc)).await?;
    tracing::info!(space = %space, doc = %doc, removed, "Deleted document");
    Ok(removed)
}

pub async fn delete_chunk(
    pool: &PgPool,
    space: &str,
    doc: &str,
    chunk: &str,
) -> Result<u64, AppError> {
    let filter = DocumentFilter::space(space).doc(doc).chunk(chunk);
    vector_store::delete_where(pool, &filter).await
}

/// Retrieve the chunks of `space` closest to `query` and pack them into a
/// context block. Returns an empty string when nothing matches.
pub async fn build_context(
    pool: &PgPool,
    embedder: &SharedEmbedder,
    space: &str,
    query: &str,
    percentage: u32,
    max_chars: usize,
    top_k: i64,
) -> Result<String, AppError> {
    let docs = search(pool, embedder, space, query, top_k).await?;
    let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
    Ok(pack_context(&contents, percentage, max_chars))
}

/// Concatenate ranked chunks until the length budget is reached.
///
/// The budget is `percentage` of the combined length, raised to at least half
/// of `max_chars` and capped at `max_chars`. The first chunk is always kept.
pub fn pack_context(contents: &[&str], percentage: u32, max_chars: usize) -> String {
    if contents.is_empty() {
        return String::new();
    }

    let lengths: Vec<usize> = contents.iter().map(|c| c.chars().count()).collect();
    let total: usize = lengths.iter().sum();
    let target = (total * percentage as usize / 100)
        .max(max_chars / 2)
        .min(max_chars);

    let mut context = String::new();
    let mut used = 0;
    for (content, len) in contents.iter().zip(lengths) {
        if used > 0 && used + len > target {
            break;
        }
        context.push_str(content);
        context.push_str(CONTEXT_SEPARATOR);
        used += len;
    }
    context
}
