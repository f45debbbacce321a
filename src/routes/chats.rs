//! Conversation routes: CRUD, history, and streamed replies.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::Event,
    Json,
};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::conversation::{
    ChatHistory, ChatSummary, CreateChat, CreatedChat, SendMessage, UpdateModel, UpdatedModel,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::chat as chat_service;
use crate::routes::EventStream;
use crate::AppState;

/// GET /chats: newest conversations first.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<ChatSummary>>>, AppError> {
    let chats = chat_service::list(&state.db, &pagination).await?;
    Ok(ApiResponse::success(chats))
}

/// POST /chats: start a conversation, optionally bound to a RAG space.
pub async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateChat>>,
) -> Result<Json<ApiResponse<CreatedChat>>, AppError> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let created = chat_service::create(&state.db, &input).await?;
    Ok(ApiResponse::success(created))
}

/// POST /chats/{id}/stream: send a message and stream the reply as SSE.
///
/// Each `message` event carries the whole reply accumulated so far.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessage>,
) -> Result<EventStream<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("Message text must not be blank".to_string()));
    }

    let replies = chat_service::send(&state, id, &body.model_name, &body.text).await?;
    let events = replies.map(|reply| {
        Ok::<_, Infallible>(match reply {
            Ok(text) => super::text_event("message", &text),
            Err(e) => super::error_event(&e),
        })
    });

    Ok(super::sse(events))
}

/// GET /chats/{id}/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ChatHistory>>, AppError> {
    let history = chat_service::history(&state.db, id, state.config.chat.history_limit).await?;
    Ok(ApiResponse::success(history))
}

/// PATCH /chats/{id}/model: remember the selected model alias.
pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateModel>,
) -> Result<Json<ApiResponse<UpdatedModel>>, AppError> {
    let updated = chat_service::update_model_name(&state.db, id, &body.model_alias).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /chats/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    chat_service::delete(&state.db, id).await?;
    Ok(ApiResponse::success(()))
}
