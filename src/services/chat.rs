//! Conversations: CRUD, history, and streamed replies with RAG context.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat_message::{Message, MessageView};
use crate::models::conversation::{
    ChatHistory, ChatSummary, Conversation, CreateChat, CreatedChat, UpdatedModel,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::llm::{ChatModel, ChatRequest};
use crate::services::{memory, rag};
use crate::AppState;

const CONVERSATION_NOT_FOUND: &str = "Conversation not found";
const CONTEXT_PROMPT: &str = "Use this additional information for answer:\n";

/// Accumulated reply text, one item per received delta.
pub type ReplyStream = ReceiverStream<Result<String, AppError>>;

/// List conversations, newest first.
pub async fn list(
    pool: &PgPool,
    pagination: &Pagination,
) -> Result<PagedResult<ChatSummary>, AppError> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations")
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, ChatSummary>(
        "SELECT id, title, model_name, rag_space FROM conversations \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Create a conversation titled with the current epoch millisecond.
pub async fn create(pool: &PgPool, input: &CreateChat) -> Result<CreatedChat, AppError> {
    let title = Utc::now().timestamp_millis().to_string();
    let rag_space = input
        .rag_space
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let conversation = sqlx::query_as::<_, Conversation>(
        "INSERT INTO conversations (id, title, rag_space) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&title)
    .bind(rag_space)
    .fetch_one(pool)
    .await?;

    tracing::info!(conversation_id = %conversation.id, rag_space = ?conversation.rag_space, "Created conversation");

    Ok(CreatedChat {
        id: conversation.id,
        title: conversation.title,
    })
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Conversation, AppError> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(CONVERSATION_NOT_FOUND.to_string()))
}

/// Remember the model last chosen for a conversation.
pub async fn update_model_name(
    pool: &PgPool,
    id: Uuid,
    model_name: &str,
) -> Result<UpdatedModel, AppError> {
    let updated = sqlx::query_scalar::<_, String>(
        "UPDATE conversations SET model_name = $2, updated_at = NOW() WHERE id = $1 RETURNING model_name",
    )
    .bind(id)
    .bind(model_name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(CONVERSATION_NOT_FOUND.to_string()))?;

    Ok(UpdatedModel {
        model_name: updated,
    })
}

/// Send `text` to the model registered as `alias` and stream its reply.
///
/// The reply is generated on a background task: it runs to completion and is
/// saved to memory even when the returned stream is dropped early.
pub async fn send(
    state: &AppState,
    id: Uuid,
    alias: &str,
    text: &str,
) -> Result<ReplyStream, AppError> {
    let (model, properties) = match (state.registry.client(alias), state.registry.properties(alias)) {
        (Some(model), Some(properties)) => (model, properties.clone()),
        _ => return Err(AppError::Validation(format!("Model '{alias}' not found"))),
    };

    let conversation = find_by_id(&state.db, id).await?;

    let context = match conversation.rag_space.as_deref() {
        Some(space) if !space.trim().is_empty() => {
            rag::build_context(
                &state.db,
                &state.embedder,
                space,
                text,
                state.config.rag.percentage,
                properties.max_context_tokens / 2,
                state.config.rag.top_k,
            )
            .await?
        }
        _ => String::new(),
    };

    let mut messages = memory::get(&state.db, id, state.config.chat.history_limit).await?;
    let user_message = Message::user(text);
    memory::add(&state.db, id, std::slice::from_ref(&user_message)).await?;
    messages.push(user_message);

    let request = ChatRequest {
        system: system_prompt(properties.system_prompt.as_deref(), &context),
        messages,
        temperature: properties.temperature,
    };

    tracing::info!(
        conversation_id = %id,
        model = %model.model_name(),
        provider = model.provider_name(),
        streaming = properties.streaming,
        context_chars = context.chars().count(),
        "Sending chat message"
    );

    let (tx, rx) = mpsc::channel(64);
    let pool = state.db.clone();
    tokio::spawn(async move {
        let reply = generate(model, request, properties.streaming, id, tx).await;
        persist_reply(&pool, id, &reply).await;
    });

    Ok(ReceiverStream::new(rx))
}

/// Forwards accumulated text until the receiving side goes away.
struct Forwarder {
    tx: mpsc::Sender<Result<String, AppError>>,
    open: bool,
    conversation_id: Uuid,
}

impl Forwarder {
    async fn send(&mut self, item: Result<String, AppError>) {
        if self.open && self.tx.send(item).await.is_err() {
            self.open = false;
            tracing::debug!(conversation_id = %self.conversation_id, "Client disconnected, finishing reply in background");
        }
    }
}

async fn generate(
    model: Arc<dyn ChatModel>,
    request: ChatRequest,
    streaming: bool,
    conversation_id: Uuid,
    tx: mpsc::Sender<Result<String, AppError>>,
) -> String {
    let mut out = Forwarder {
        tx,
        open: true,
        conversation_id,
    };
    let mut reply = String::new();

    let result = if streaming {
        match model.stream(&request).await {
            Ok(mut deltas) => loop {
                match deltas.next().await {
                    Some(Ok(delta)) => {
                        reply.push_str(&delta);
                        out.send(Ok(reply.clone())).await;
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                }
            },
            Err(e) => Err(e),
        }
    } else {
        match model.call(&request).await {
            Ok(text) => {
                reply.push_str(&text);
                out.send(Ok(reply.clone())).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    if let Err(e) = result {
        tracing::error!(
            conversation_id = %conversation_id,
            model = %model.model_name(),
            error = %e,
            "LLM error"
        );
        out.send(Err(e)).await;
    }
    reply
}

/// Store a finished reply as an ASSISTANT message. Empty replies and a repeat
/// of the latest assistant message are skipped; failures are only logged.
pub async fn persist_reply(pool: &PgPool, conversation_id: Uuid, reply: &str) {
    if reply.is_empty() {
        return;
    }
    let result: Result<(), AppError> = async {
        if memory::last_is_assistant(pool, conversation_id, reply).await? {
            return Ok(());
        }
        memory::add(pool, conversation_id, &[Message::assistant(reply)]).await
    }
    .await;

    if let Err(e) = result {
        tracing::error!(conversation_id = %conversation_id, error = %e, "Failed to persist assistant message");
    }
}

/// Model prompt followed by the retrieved context, when there is any.
pub fn system_prompt(prompt: Option<&str>, context: &str) -> String {
    let mut system = String::new();
    if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
        system.push_str(prompt);
    }
    if !context.trim().is_empty() {
        system.push_str("\n\n");
        system.push_str(CONTEXT_PROMPT);
        system.push_str(context);
    }
    system
}

/// The most recent `limit` messages of a conversation.
pub async fn history(pool: &PgPool, id: Uuid, limit: i64) -> Result<ChatHistory, AppError> {
    let messages = memory::get(pool, id, limit)
        .await?
        .into_iter()
        .map(MessageView::from)
        .collect();
    Ok(ChatHistory {
        chat_id: id,
        messages,
    })
}

/// Delete a conversation together with its memory.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(CONVERSATION_NOT_FOUND.to_string()));
    }
    memory::clear(pool, id).await?;
    tracing::info!(conversation_id = %id, "Deleted conversation");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::TextStream;
    use async_trait::async_trait;
    use futures::stream;

    #[test]
    fn system_prompt_variants() {
        assert_eq!(system_prompt(None, ""), "");
        assert_eq!(system_prompt(Some("Be brief."), "  "), "Be brief.");
        assert_eq!(
            system_prompt(Some("Be brief."), "fact\n---\n"),
            "Be brief.\n\nUse this additional information for answer:\nfact\n---\n"
        );
        assert_eq!(
            system_prompt(Some(" "), "fact"),
            "\n\nUse this additional information for answer:\nfact"
        );
    }

    struct ScriptedModel {
        deltas: Vec<Result<String, AppError>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn call(&self, _request: &ChatRequest) -> Result<String, AppError> {
            Ok("whole answer".to_string())
        }

        async fn stream(&self, _request: &ChatRequest) -> Result<TextStream, AppError> {
            let items: Vec<_> = self
                .deltas
                .iter()
                .map(|d| match d {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(AppError::Upstream(e.to_string())),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "Test"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            system: String::new(),
            messages: vec![Message::user("hi")],
            temperature: 1.0,
        }
    }

    #[tokio::test]
    async fn streaming_emits_accumulated_text() {
        let model = Arc::new(ScriptedModel {
            deltas: vec![Ok("Hel".into()), Ok("lo".into()), Ok("!".into())],
        });
        let (tx, rx) = mpsc::channel(8);
        let reply = generate(model, request(), true, Uuid::nil(), tx).await;
        assert_eq!(reply, "Hello!");

        let items: Vec<String> = ReceiverStream::new(rx)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["Hel", "Hello", "Hello!"]);
    }

    #[tokio::test]
    async fn non_streaming_emits_single_item() {
        let model = Arc::new(ScriptedModel { deltas: vec![] });
        let (tx, rx) = mpsc::channel(8);
        let reply = generate(model, request(), false, Uuid::nil(), tx).await;
        assert_eq!(reply, "whole answer");

        let items: Vec<_> = ReceiverStream::new(rx).collect().await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_keeps_partial_reply_and_reports() {
        let model = Arc::new(ScriptedModel {
            deltas: vec![Ok("part".into()), Err(AppError::Upstream("boom".into()))],
        });
        let (tx, rx) = mpsc::channel(8);
        let reply = generate(model, request(), true, Uuid::nil(), tx).await;
        assert_eq!(reply, "part");

        let items: Vec<_> = ReceiverStream::new(rx).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn generation_completes_after_client_disconnects() {
        let model = Arc::new(ScriptedModel {
            deltas: vec![Ok("a".into()), Ok("b".into()), Ok("c".into())],
        });
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let reply = generate(model, request(), true, Uuid::nil(), tx).await;
        assert_eq!(reply, "abc");
    }
}
