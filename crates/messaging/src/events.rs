//! Realtime wire events.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`.
//! Inbound payload fields are optional so that a frame with missing fields
//! still decodes and can be rejected by the gateway instead of the codec.

use database::{Message, MessageStatus};
use serde::{Deserialize, Serialize};

/// Events a client sends to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat(JoinChat),
    SendMessage(SendMessage),
    MessageDelivered(StatusAck),
    MessageRead(StatusAck),
    Typing(Typing),
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat(_) => "join_chat",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::MessageDelivered(_) => "message_delivered",
            ClientEvent::MessageRead(_) => "message_read",
            ClientEvent::Typing(_) => "typing",
        }
    }

    /// Decode a text frame.
    pub fn from_frame(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinChat {
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendMessage {
    pub chat_id: Option<String>,
    pub sender: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// Delivery or read acknowledgement for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusAck {
    pub message_id: Option<String>,
    /// Phone number of the acknowledging participant.
    pub by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Typing {
    pub chat_id: Option<String>,
    pub sender: Option<String>,
    pub is_typing: Option<bool>,
}

/// Events the gateway pushes to sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full persisted message, sent to the conversation group.
    Message(Message),
    /// Lightweight notice sent to each participant's personal group.
    NewMessageNotification(MessageNotification),
    MessageStatus(StatusUpdate),
    Typing(TypingIndicator),
    /// Rejection notice for the originating session only.
    Error(ErrorNotice),
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
            ServerEvent::NewMessageNotification(_) => "new_message_notification",
            ServerEvent::MessageStatus(_) => "message_status",
            ServerEvent::Typing(_) => "typing",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNotification {
    pub chat_id: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub message_id: String,
    pub status: MessageStatus,
    pub by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub chat_id: String,
    pub sender: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    /// Name of the rejected client event, or `unknown` for undecodable frames.
    pub event: String,
    pub message: String,
}
