//! Conversation directory: participant sets, lookup and last-message summaries.

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{from_millis, Conversation, LastMessage, MessageKind};
use crate::validation::validate_phone_number;

const SELECT_COLUMNS: &str = "id, participants, title, last_message_text, last_message_type, \
                              last_message_at, created_at, updated_at";

#[derive(FromRow)]
struct ConversationRow {
    id: String,
    participants: String,
    title: String,
    last_message_text: Option<String>,
    last_message_type: Option<String>,
    last_message_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = DatabaseError;

    fn try_from(row: ConversationRow) -> Result<Self> {
        let participants: Vec<String> =
            serde_json::from_str(&row.participants).map_err(|e| DatabaseError::Corrupt {
                column: "conversations.participants",
                reason: e.to_string(),
            })?;

        let last_message = match (row.last_message_text, row.last_message_type, row.last_message_at) {
            (Some(text), Some(kind), Some(at)) => Some(LastMessage {
                text,
                kind: kind.parse::<MessageKind>().map_err(|e| DatabaseError::Corrupt {
                    column: "conversations.last_message_type",
                    reason: format!("{}", e),
                })?,
                at: from_millis("conversations.last_message_at", at)?,
            }),
            _ => None,
        };

        Ok(Conversation {
            id: row.id,
            participants,
            title: row.title,
            last_message,
            created_at: from_millis("conversations.created_at", row.created_at)?,
            updated_at: from_millis("conversations.updated_at", row.updated_at)?,
        })
    }
}

/// Canonical key for a participant set: the sorted identifiers as a JSON array.
///
/// Order of the inputs never matters, so `{a, b}` and `{b, a}` share a key.
pub fn participant_key(participants: &[&str]) -> Result<(Vec<String>, String)> {
    let mut sorted = Vec::with_capacity(participants.len());
    for participant in participants {
        sorted.push(validate_phone_number(participant)?.to_string());
    }
    sorted.sort();

    let key = serde_json::to_string(&sorted).map_err(|e| DatabaseError::Corrupt {
        column: "conversations.participants",
        reason: e.to_string(),
    })?;
    Ok((sorted, key))
}

/// Find the one-to-one conversation between `a` and `b`, creating it if absent.
///
/// Creation is a single `INSERT ... ON CONFLICT DO NOTHING` against the
/// unique participant key, so concurrent first-contact calls for the same
/// pair converge on one row.
pub async fn find_or_create_one_to_one(pool: &SqlitePool, a: &str, b: &str) -> Result<Conversation> {
    let (_, key) = participant_key(&[a, b])?;
    let now = Utc::now().timestamp_millis();
    let id = Uuid::new_v4().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO conversations (id, participants, title, created_at, updated_at)
        VALUES (?, ?, '', ?, ?)
        ON CONFLICT(participants) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(&key)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!(chat_id = %id, participants = %key, "Created conversation");
    } else {
        debug!(participants = %key, "Reusing existing conversation");
    }

    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {} FROM conversations WHERE participants = ?",
        SELECT_COLUMNS
    ))
    .bind(&key)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", key.clone()))?;

    row.try_into()
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, chat_id: &str) -> Result<Conversation> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {} FROM conversations WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(chat_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", chat_id))?;

    row.try_into()
}

/// List every conversation `phone_number` takes part in, most recently updated first.
pub async fn list_for_participant(pool: &SqlitePool, phone_number: &str) -> Result<Vec<Conversation>> {
    let phone_number = validate_phone_number(phone_number)?;

    let rows = sqlx::query_as::<_, ConversationRow>(&format!(
        r#"
        SELECT {}
        FROM conversations
        WHERE EXISTS (
            SELECT 1 FROM json_each(conversations.participants)
            WHERE json_each.value = ?
        )
        ORDER BY updated_at DESC, rowid DESC
        "#,
        SELECT_COLUMNS
    ))
    .bind(phone_number)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Conversation::try_from).collect()
}

/// Overwrite a conversation's last-message summary and bump its update time.
///
/// Returns the updated conversation so callers can address its participants.
pub async fn record_last_message<'e, E>(
    executor: E,
    chat_id: &str,
    kind: MessageKind,
    content: &str,
    at: DateTime<Utc>,
) -> Result<Conversation>
where
    E: Executor<'e, Database = Sqlite>,
{
    let at = at.timestamp_millis();

    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        r#"
        UPDATE conversations
        SET last_message_text = ?,
            last_message_type = ?,
            last_message_at = ?,
            updated_at = MAX(updated_at, ?)
        WHERE id = ?
        RETURNING {}
        "#,
        SELECT_COLUMNS
    ))
    .bind(kind.preview(content))
    .bind(kind.as_str())
    .bind(at)
    .bind(at)
    .bind(chat_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", chat_id))?;

    row.try_into()
}

/// Set the display title of a conversation and return the updated record.
pub async fn set_title(pool: &SqlitePool, chat_id: &str, title: &str) -> Result<Conversation> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        r#"
        UPDATE conversations
        SET title = ?
        WHERE id = ?
        RETURNING {}
        "#,
        SELECT_COLUMNS
    ))
    .bind(title.trim())
    .bind(chat_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", chat_id))?;

    row.try_into()
}

/// Count total conversations.
pub async fn count_conversations(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM conversations
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
