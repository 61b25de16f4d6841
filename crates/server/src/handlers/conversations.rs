use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::conversations::{ChatMessage, ConversationSummary};
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub id: i64,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<ConversationList>> {
    info!("GET /conversations - user {}", ctx.user_id());

    let conversations = state.conversations.list(ctx.user_id()).await?;
    Ok(Json(ConversationList { conversations }))
}

/// GET /conversation/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(raw_id): Path<String>,
) -> Result<Json<ConversationDetail>> {
    info!("GET /conversation/{} - user {}", raw_id, ctx.user_id());

    // Malformed ids get the same answer as missing ones
    let id: i64 = raw_id.parse().map_err(|_| Error::NotFound("Conversation"))?;
    let conversation = state.conversations.load(id, ctx.user_id()).await?;

    Ok(Json(ConversationDetail {
        id: conversation.id,
        messages: conversation.messages,
        created_at: conversation.created_at,
    }))
}
