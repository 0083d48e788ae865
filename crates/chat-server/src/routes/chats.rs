//! Conversation and message routes.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use database::validation::require_opt;
use database::{conversation, message, Conversation, Message, NewMessage, PageQuery, ValidationError};
use messaging::SendOrigin;
use serde::{Deserialize, Serialize};

use super::Envelope;
use crate::error::Result;
use crate::extract::{JsonBody, QueryParams};
use crate::state::AppState;

/// Body of `POST /api/chats/one-to-one`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OneToOneRequest {
    pub a: Option<String>,
    pub b: Option<String>,
    /// Replaces the stored title when non-blank.
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatBody {
    pub chat: Conversation,
}

#[derive(Debug, Serialize)]
pub struct ChatsBody {
    pub chats: Vec<Conversation>,
}

/// Query of `GET /api/chats/:chat_id/messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub limit: Option<u32>,
    /// RFC 3339 timestamp, or epoch milliseconds.
    pub before: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessagesBody {
    pub messages: Vec<Message>,
}

/// Body of `POST /api/chats/:chat_id/messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendRequest {
    pub sender: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: Message,
}

/// Find or create the conversation between two participants.
pub async fn one_to_one(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OneToOneRequest>,
) -> Result<Json<Envelope<ChatBody>>> {
    let a = require_opt("a", req.a.as_deref())?;
    let b = require_opt("b", req.b.as_deref())?;

    let pool = state.db().pool();
    let mut chat = conversation::find_or_create_one_to_one(pool, a, b).await?;
    if let Some(title) = req.title.as_deref().filter(|t| !t.trim().is_empty()) {
        chat = conversation::set_title(pool, &chat.id, title).await?;
    }
    Ok(Json(Envelope::ok(ChatBody { chat })))
}

/// Conversations of one participant, most recently active first.
pub async fn for_participant(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Envelope<ChatsBody>>> {
    let chats = conversation::list_for_participant(state.db().pool(), &phone).await?;
    Ok(Json(Envelope::ok(ChatsBody { chats })))
}

/// A page of history, oldest to newest.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Envelope<MessagesBody>>> {
    let before = params
        .before
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(parse_before)
        .transpose()?;

    let query = PageQuery {
        limit: params.limit,
        before,
    };
    let messages = message::list_page(state.db().pool(), &chat_id, query).await?;
    Ok(Json(Envelope::ok(MessagesBody { messages })))
}

/// Send a message over HTTP through the same path as realtime sends.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    JsonBody(req): JsonBody<SendRequest>,
) -> Result<Json<Envelope<MessageBody>>> {
    let draft = NewMessage {
        chat_id,
        sender: require_opt("sender", req.sender.as_deref())?.to_string(),
        kind: require_opt("type", req.kind.as_deref())?.to_string(),
        content: req.content.unwrap_or_default(),
        meta: req.meta,
    };

    let message = state.gateway.submit_message(draft, SendOrigin::Rest).await?;
    Ok(Json(Envelope::ok(MessageBody { message })))
}

fn parse_before(raw: &str) -> std::result::Result<DateTime<Utc>, ValidationError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))
}
