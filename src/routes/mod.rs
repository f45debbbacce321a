//! Route definitions and router assembly.

pub mod chats;
pub mod health;
pub mod models;
pub mod rag;
pub mod spaces;

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
    routing::{delete, get, patch, post},
    Router,
};
use futures::Stream;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::errors::{ApiError, AppError};
use crate::AppState;

/// Documents are posted as raw text, so allow bodies well above axum's default.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_routes = Router::new()
        .route("/chats", get(chats::list).post(chats::create))
        .route("/chats/{id}", delete(chats::delete))
        .route("/chats/{id}/stream", post(chats::stream))
        .route("/chats/{id}/history", get(chats::history))
        .route("/chats/{id}/model", patch(chats::update_model));

    let space_routes = Router::new()
        .route("/spaces", get(spaces::list).post(spaces::create))
        .route("/spaces/{id}", delete(spaces::delete));

    let rag_routes = Router::new()
        .route("/rag/{space}/documents", get(rag::list).post(rag::add))
        .route("/rag/{space}/documents/{doc}", delete(rag::delete_document))
        .route(
            "/rag/{space}/documents/{doc}/chunks/{chunk}",
            delete(rag::delete_chunk),
        )
        .route("/rag/{space}/search", get(rag::search));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/models", get(models::list))
        .merge(chat_routes)
        .merge(space_routes)
        .merge(rag_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// SSE response with the shared keep-alive applied.
pub(crate) type EventStream<S> = Sse<KeepAliveStream<S>>;

/// Wrap an event stream with the shared keep-alive policy.
pub(crate) fn sse<S>(events: S) -> EventStream<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(events).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE).text("ping"))
}

/// Named event carrying free text. Carriage returns are not allowed in SSE
/// fields, so line endings are normalized to `\n`.
pub(crate) fn text_event(name: &str, text: &str) -> Event {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    Event::default().event(name).data(normalized)
}

/// `error` event with the same `{code, message}` body as JSON error responses.
pub(crate) fn error_event(err: &AppError) -> Event {
    let body = ApiError {
        code: err.code().to_string(),
        message: err.public_message(),
    };
    let data = serde_json::to_string(&body).unwrap_or_default();
    Event::default().event("error").data(data)
}
