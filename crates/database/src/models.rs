//! Database models.
//!
//! Timestamps are stored as epoch milliseconds and exposed as
//! `DateTime<Utc>`; every model serializes with camelCase keys, which is the
//! shape clients see on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};
use crate::validation::ValidationError;

/// A registered user, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned UUID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique phone number, also the participant identifier in conversations.
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Sticker,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Sticker => "sticker",
            MessageKind::System => "system",
        }
    }

    /// Preview text stored in a conversation summary for content of this kind.
    ///
    /// Text messages preview their literal body, everything else a bracketed
    /// placeholder such as `[image]`.
    pub fn preview(&self, content: &str) -> String {
        match self {
            MessageKind::Text => content.to_string(),
            other => format!("[{}]", other.as_str()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "sticker" => Ok(MessageKind::Sticker),
            "system" => Ok(MessageKind::System),
            other => Err(ValidationError::InvalidMessageType(other.to_string())),
        }
    }
}

/// Delivery stage of a message. Ordered: `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Position in the delivery sequence, matching the SQL `CASE` used for
    /// monotone updates.
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

/// Denormalized summary of the latest message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    /// Literal text, or a `[type]` placeholder for non-text messages.
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub at: DateTime<Utc>,
}

/// A conversation between a fixed participant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Participant phone numbers, sorted.
    pub participants: Vec<String>,
    /// Optional title, empty for one-to-one conversations.
    pub title: String,
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether `phone_number` is one of the participants.
    pub fn has_participant(&self, phone_number: &str) -> bool {
        self.participants.iter().any(|p| p == phone_number)
    }
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Sender phone number.
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text body, image URL or sticker token.
    pub content: String,
    pub status: MessageStatus,
    /// Free-form metadata (image dimensions, file size, ...).
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for appending a message. Fields are raw so the store can validate them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMessage {
    pub chat_id: String,
    pub sender: String,
    /// Wire name of the message type, parsed on append.
    pub kind: String,
    pub content: String,
    pub meta: Option<serde_json::Value>,
}

/// Outcome of a status update on an existing message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// The record as stored after the update.
    pub message: Message,
    /// False when the requested status was not ahead of the stored one.
    pub advanced: bool,
}

/// Convert stored epoch milliseconds into a UTC timestamp.
pub(crate) fn from_millis(column: &'static str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| DatabaseError::Corrupt {
        column,
        reason: format!("timestamp {} out of range", millis),
    })
}
