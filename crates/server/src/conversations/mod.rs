//! Conversation persistence
//!
//! A conversation is an ordered list of turns stored as one JSON blob and
//! owned by exactly one user. Lookups by a non-owner fail exactly like
//! lookups of missing ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::core::db::{format_timestamp, parse_timestamp};
use crate::core::error::{Error, Result};

/// Character budget for list previews
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

/// First message's content cut to [`PREVIEW_CHARS`] characters
pub fn preview(messages: &[ChatMessage]) -> String {
    messages
        .first()
        .map(|m| m.content.chars().take(PREVIEW_CHARS).collect())
        .unwrap_or_default()
}

pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load a conversation owned by `owner_id`
    pub async fn load(&self, conversation_id: i64, owner_id: i64) -> Result<Conversation> {
        let row: Option<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT id, user_id, messages, created_at FROM conversations WHERE id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let (id, user_id, messages, created_at) = row.ok_or(Error::NotFound("Conversation"))?;

        Ok(Conversation {
            id,
            user_id,
            messages: serde_json::from_str(&messages)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    pub async fn create(&self, owner_id: i64, messages: &[ChatMessage]) -> Result<Conversation> {
        create(&self.pool, owner_id, messages).await
    }

    pub async fn append(&self, conversation: &Conversation, base_len: usize) -> Result<()> {
        append(&self.pool, conversation, base_len).await
    }

    /// Newest first
    pub async fn list(&self, owner_id: i64) -> Result<Vec<ConversationSummary>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT id, messages, created_at FROM conversations WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, messages, created_at)| -> Result<ConversationSummary> {
                let messages: Vec<ChatMessage> = serde_json::from_str(&messages)?;
                Ok(ConversationSummary {
                    id,
                    created_at: parse_timestamp(&created_at)?,
                    preview: preview(&messages),
                })
            })
            .collect()
    }
}

/// Allocate a new conversation holding `messages`
pub async fn create<'e, E>(executor: E, owner_id: i64, messages: &[ChatMessage]) -> Result<Conversation>
where
    E: SqliteExecutor<'e>,
{
    let created_at = Utc::now();
    let blob = serde_json::to_string(messages)?;

    let result = sqlx::query("INSERT INTO conversations (user_id, messages, created_at) VALUES (?, ?, ?)")
        .bind(owner_id)
        .bind(blob)
        .bind(format_timestamp(created_at))
        .execute(executor)
        .await?;

    Ok(Conversation {
        id: result.last_insert_rowid(),
        user_id: owner_id,
        messages: messages.to_vec(),
        created_at,
    })
}

/// Persist the full, already extended message list.
///
/// `base_len` is how many messages the conversation held when it was loaded.
/// The write only lands if the stored list still has that length, so two
/// turns racing on one conversation cannot overwrite each other.
pub async fn append<'e, E>(executor: E, conversation: &Conversation, base_len: usize) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let blob = serde_json::to_string(&conversation.messages)?;

    let result = sqlx::query(
        "UPDATE conversations SET messages = ? WHERE id = ? AND user_id = ? AND json_array_length(messages) = ?",
    )
    .bind(blob)
    .bind(conversation.id)
    .bind(conversation.user_id)
    .bind(base_len as i64)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(
            "Conversation was updated by another request, please retry",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_uses_first_message() {
        let messages = vec![ChatMessage::user("hello"), ChatMessage::assistant("hi there")];
        assert_eq!(preview(&messages), "hello");
        assert_eq!(preview(&[]), "");
    }

    #[test]
    fn preview_truncates_by_characters_not_bytes() {
        let long = "é".repeat(150);
        let cut = preview(&[ChatMessage::user(long)]);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS);
        assert!(cut.chars().all(|c| c == 'é'));

        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&[ChatMessage::user(exact.clone())]), exact);
    }

    #[tokio::test]
    async fn stale_append_is_rejected_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("conv.db").display());
        let pool = crate::core::db::connect(&url).await.unwrap();
        let auth = crate::core::auth::AuthManager::new(pool.clone(), "s", chrono::Duration::days(1));
        let (user, _) = auth.register("a@b.com", "x").await.unwrap();
        let store = ConversationStore::new(pool);

        let first_turn = [ChatMessage::user("q1"), ChatMessage::assistant("a1")];
        let created = store.create(user.id, &first_turn).await.unwrap();

        let mut left = store.load(created.id, user.id).await.unwrap();
        let mut right = store.load(created.id, user.id).await.unwrap();

        left.messages.push(ChatMessage::user("left"));
        left.messages.push(ChatMessage::assistant("left reply"));
        store.append(&left, 2).await.unwrap();

        right.messages.push(ChatMessage::user("right"));
        right.messages.push(ChatMessage::assistant("right reply"));
        assert!(matches!(store.append(&right, 2).await, Err(Error::Conflict(_))));

        let stored = store.load(created.id, user.id).await.unwrap();
        assert_eq!(stored.messages, left.messages);

        // Reloading and extending from the current length works again
        right = stored.clone();
        right.messages.push(ChatMessage::user("right"));
        right.messages.push(ChatMessage::assistant("right reply"));
        store.append(&right, 4).await.unwrap();
        assert_eq!(store.load(created.id, user.id).await.unwrap().messages.len(), 6);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
