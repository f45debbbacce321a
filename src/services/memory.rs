//! Persistent chat memory backed by the `chat_messages` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat_message::{ChatMessageRow, Message, Role};

/// Append messages to a conversation, in order.
pub async fn add(pool: &PgPool, conversation_id: Uuid, messages: &[Message]) -> Result<(), AppError> {
    if messages.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for message in messages {
        sqlx::query(
            "INSERT INTO chat_messages (id, conversation_id, role, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// The newest `last_n` messages, oldest first.
pub async fn get(pool: &PgPool, conversation_id: Uuid, last_n: i64) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query_as::<_, ChatMessageRow>(
        r#"
        SELECT id, conversation_id, role, content, created_at FROM (
            SELECT id, conversation_id, role, content, created_at
            FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
        ) recent
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(conversation_id)
    .bind(last_n.max(0))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Message::from).collect())
}

/// Remove every message of a conversation.
pub async fn clear(pool: &PgPool, conversation_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM chat_messages WHERE conversation_id = $1")
        .bind(conversation_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Whether the most recent stored message is an assistant message with `text`.
pub async fn last_is_assistant(pool: &PgPool, conversation_id: Uuid, text: &str) -> Result<bool, AppError> {
    let last = sqlx::query_as::<_, ChatMessageRow>(
        "SELECT id, conversation_id, role, content, created_at FROM chat_messages \
         WHERE conversation_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(last.is_some_and(|row| is_same_assistant_reply(&row, text)))
}

fn is_same_assistant_reply(row: &ChatMessageRow, text: &str) -> bool {
    Role::from_stored(&row.role) == Role::Assistant && row.content == text
}
