//! Input validation for users, conversations and messages.

use std::fmt;

use crate::models::MessageKind;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Message type outside `text`, `image`, `sticker`, `system`.
    InvalidMessageType(String),
    /// Status outside `sent`, `delivered`, `read`.
    InvalidStatus(String),
    /// Message metadata that is not a JSON object.
    InvalidMeta(String),
    /// Timestamp that could not be parsed or represented.
    InvalidTimestamp(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} is required", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::InvalidMessageType(kind) => {
                write!(f, "Invalid message type: {}", kind)
            }
            ValidationError::InvalidStatus(status) => write!(f, "Invalid status: {}", status),
            ValidationError::InvalidMeta(msg) => write!(f, "Invalid meta: {}", msg),
            ValidationError::InvalidTimestamp(msg) => write!(f, "Invalid timestamp: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for phone numbers.
pub const MAX_PHONE_LENGTH: usize = 32;

/// Maximum allowed length for display names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum allowed length for message content (text body, URL or sticker token).
pub const MAX_CONTENT_LENGTH: usize = 16 * 1024;

/// Require a non-blank value, returning it trimmed.
pub fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }
    Ok(value)
}

/// Same as [`require`] for values that may be absent altogether.
pub fn require_opt<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    require(field, value.unwrap_or_default())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

/// Validate a phone number used as a participant identifier.
///
/// Phone numbers are opaque to the messaging core; only presence and length
/// are checked.
pub fn validate_phone_number(phone: &str) -> Result<&str, ValidationError> {
    let phone = require("phoneNumber", phone)?;
    check_length("phoneNumber", phone, MAX_PHONE_LENGTH)?;
    Ok(phone)
}

/// Validate a user display name.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let name = require("name", name)?;
    check_length("name", name, MAX_NAME_LENGTH)?;
    Ok(name)
}

/// Validate message content. Content is not trimmed: whitespace is part of a text body.
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty("content".to_string()));
    }
    check_length("content", content, MAX_CONTENT_LENGTH)?;
    Ok(content)
}

/// Parse a message type from its wire name.
pub fn parse_message_kind(kind: &str) -> Result<MessageKind, ValidationError> {
    let kind = require("type", kind)?;
    kind.parse()
}

/// Normalize optional message metadata into a JSON object.
pub fn normalize_meta(meta: Option<serde_json::Value>) -> Result<serde_json::Value, ValidationError> {
    match meta {
        None | Some(serde_json::Value::Null) => Ok(serde_json::Value::Object(Default::default())),
        Some(value @ serde_json::Value::Object(_)) => Ok(value),
        Some(other) => Err(ValidationError::InvalidMeta(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
