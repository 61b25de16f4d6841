//! Chat turn orchestration
//!
//! auth gate -> quota check -> load history -> completion -> persist turn and
//! count it in one transaction. Nothing is written unless the model replied.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::Mode;
use crate::conversations::{self, ChatMessage, Conversation};
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use crate::core::extract::JsonBody;
use crate::usage;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub mode: Option<String>,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: i64,
    pub mode: Mode,
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    ctx: Ctx,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    info!("POST /chat - user {}", ctx.user_id());

    if req.message.trim().is_empty() {
        return Err(Error::Validation("Message required".to_string()));
    }
    let mode = match req.mode.as_deref() {
        Some(raw) => raw.parse::<Mode>()?,
        None => Mode::default(),
    };

    let user = state.auth.get_user(ctx.user_id()).await?;
    let remaining = state.usage.check(&user).await?;

    let mut conversation: Option<Conversation> = match req.conversation_id {
        Some(id) => Some(state.conversations.load(id, user.id).await?),
        None => None,
    };

    let mut messages = conversation
        .as_ref()
        .map(|c| c.messages.clone())
        .unwrap_or_default();
    messages.push(ChatMessage::user(req.message));

    let reply = state.completions.reply(mode, &messages).await?;
    messages.push(ChatMessage::assistant(reply.clone()));

    let mut tx = state.pool.begin().await?;

    let conversation_id = match conversation.as_mut() {
        Some(existing) => {
            let base_len = existing.messages.len();
            existing.messages = messages;
            // A conflict drops the transaction, so the turn is not counted
            conversations::append(&mut *tx, existing, base_len).await?;
            existing.id
        }
        None => conversations::create(&mut *tx, user.id, &messages).await?.id,
    };
    usage::increment(&mut *tx, user.id, Utc::now().date_naive()).await?;

    tx.commit().await?;

    info!(
        "Chat turn stored in conversation {} ({} left today)",
        conversation_id,
        remaining - 1
    );

    Ok(Json(ChatResponse {
        response: reply,
        conversation_id,
        mode,
    }))
}
