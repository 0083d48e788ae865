//! Message store: append, paginated history and delivery-status transitions.

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::conversation::record_last_message;
use crate::error::{DatabaseError, Result};
use crate::models::{
    from_millis, Conversation, Message, MessageKind, MessageStatus, NewMessage, StatusChange,
};
use crate::validation::{normalize_meta, parse_message_kind, require, validate_content};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page a single query will return.
pub const MAX_PAGE_LIMIT: u32 = 200;

const SELECT_COLUMNS: &str =
    "id, chat_id, sender, kind, content, status, meta, created_at, updated_at";

#[derive(FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    sender: String,
    kind: String,
    content: String,
    status: String,
    meta: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = DatabaseError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let kind = row
            .kind
            .parse::<MessageKind>()
            .map_err(|e| DatabaseError::Corrupt {
                column: "messages.kind",
                reason: e.to_string(),
            })?;
        let status = row
            .status
            .parse::<MessageStatus>()
            .map_err(|e| DatabaseError::Corrupt {
                column: "messages.status",
                reason: e.to_string(),
            })?;
        let meta = serde_json::from_str(&row.meta).map_err(|e| DatabaseError::Corrupt {
            column: "messages.meta",
            reason: e.to_string(),
        })?;

        Ok(Message {
            id: row.id,
            chat_id: row.chat_id,
            sender: row.sender,
            kind,
            content: row.content,
            status,
            meta,
            created_at: from_millis("messages.created_at", row.created_at)?,
            updated_at: from_millis("messages.updated_at", row.updated_at)?,
        })
    }
}

/// Pagination window for [`list_page`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// Maximum number of messages; `None` means [`DEFAULT_PAGE_LIMIT`].
    pub limit: Option<u32>,
    /// Only messages created strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}

impl PageQuery {
    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            before: None,
        }
    }

    fn effective_limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT))
    }
}

/// Millisecond bound for `created_at < before`, rounding a sub-millisecond
/// remainder up so no stored millisecond earlier than `before` is excluded.
fn ceil_millis(at: DateTime<Utc>) -> i64 {
    let millis = at.timestamp_millis();
    if at.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

/// Conversation and message IDs are UUIDs; anything else cannot name a record.
fn is_well_formed_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Append a message to a conversation with status `sent`.
///
/// Does not touch the conversation summary; callers follow up with
/// [`crate::conversation::record_last_message`].
pub async fn append(pool: &SqlitePool, new: &NewMessage) -> Result<Message> {
    append_at(pool, new, Utc::now()).await
}

/// Append a message with an explicit creation time.
///
/// Accepts a pool or an open transaction.
pub async fn append_at<'e, E>(executor: E, new: &NewMessage, created_at: DateTime<Utc>) -> Result<Message>
where
    E: Executor<'e, Database = Sqlite>,
{
    let chat_id = require("chatId", &new.chat_id)?;
    let sender = require("sender", &new.sender)?;
    let kind = parse_message_kind(&new.kind)?;
    let content = validate_content(&new.content)?;
    let meta = normalize_meta(new.meta.clone())?;

    if !is_well_formed_id(chat_id) {
        return Err(DatabaseError::not_found("Conversation", chat_id));
    }

    let id = Uuid::new_v4().to_string();
    let millis = created_at.timestamp_millis();

    sqlx::query(
        r#"
        INSERT INTO messages (id, chat_id, sender, kind, content, status, meta, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(chat_id)
    .bind(sender)
    .bind(kind.as_str())
    .bind(content)
    .bind(MessageStatus::Sent.as_str())
    .bind(meta.to_string())
    .bind(millis)
    .bind(millis)
    .execute(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return DatabaseError::not_found("Conversation", chat_id);
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    debug!(message_id = %id, chat_id = %chat_id, kind = %kind, "Appended message");

    let created_at = from_millis("messages.created_at", millis)?;
    Ok(Message {
        id,
        chat_id: chat_id.to_string(),
        sender: sender.to_string(),
        kind,
        content: content.to_string(),
        status: MessageStatus::Sent,
        meta,
        created_at,
        updated_at: created_at,
    })
}

/// Append a message and record it as its conversation's last message.
///
/// Both writes share one transaction: if the summary update fails the
/// message is not stored either.
pub async fn append_with_summary(pool: &SqlitePool, new: &NewMessage) -> Result<(Message, Conversation)> {
    let mut tx = pool.begin().await?;

    let message = append_at(&mut *tx, new, Utc::now()).await?;
    let chat = record_last_message(
        &mut *tx,
        &message.chat_id,
        message.kind,
        &message.content,
        message.created_at,
    )
    .await?;

    tx.commit().await?;
    Ok((message, chat))
}

/// List a page of messages, oldest to newest.
///
/// The newest `limit` messages matching the window are fetched and then put
/// back into chronological order.
pub async fn list_page(pool: &SqlitePool, chat_id: &str, query: PageQuery) -> Result<Vec<Message>> {
    if !is_well_formed_id(chat_id) {
        return Err(DatabaseError::not_found("Conversation", chat_id));
    }

    let before = query.before.map(ceil_millis);

    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        r#"
        SELECT {}
        FROM messages
        WHERE chat_id = ?
          AND (? IS NULL OR created_at < ?)
        ORDER BY created_at DESC, seq DESC
        LIMIT ?
        "#,
        SELECT_COLUMNS
    ))
    .bind(chat_id)
    .bind(before)
    .bind(before)
    .bind(query.effective_limit())
    .fetch_all(pool)
    .await?;

    let mut messages = rows
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

/// Get a message by ID. Unknown or malformed IDs yield `None`.
pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Option<Message>> {
    if !is_well_formed_id(id) {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {} FROM messages WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Message::try_from).transpose()
}

/// Move a message forward in the `sent -> delivered -> read` sequence.
///
/// The update only applies when `status` is ahead of the stored status, so
/// the recorded status never moves backwards. A missing message is reported
/// as `None` rather than an error.
pub async fn advance_status(
    pool: &SqlitePool,
    id: &str,
    status: MessageStatus,
) -> Result<Option<StatusChange>> {
    if !is_well_formed_id(id) {
        return Ok(None);
    }

    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?, updated_at = ?
        WHERE id = ?
          AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END) < ?
        "#,
    )
    .bind(status.as_str())
    .bind(Utc::now().timestamp_millis())
    .bind(id)
    .bind(status.rank())
    .execute(pool)
    .await?;

    let advanced = result.rows_affected() > 0;

    Ok(get_message(pool, id).await?.map(|message| {
        if !advanced {
            debug!(
                message_id = %id,
                requested = %status,
                current = %message.status,
                "Status update not ahead of stored status"
            );
        }
        StatusChange { message, advanced }
    }))
}

/// Count messages in a conversation.
pub async fn count_messages(pool: &SqlitePool, chat_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages WHERE chat_id = ?
        "#,
    )
    .bind(chat_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::find_or_create_one_to_one;
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn test_chat(db: &Database) -> String {
        find_or_create_one_to_one(db.pool(), "555-0100", "555-0200")
            .await
            .unwrap()
            .id
    }

    fn text(chat_id: &str, content: &str) -> NewMessage {
        NewMessage {
            chat_id: chat_id.to_string(),
            sender: "555-0100".to_string(),
            kind: "text".to_string(),
            content: content.to_string(),
            meta: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_defaults() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        let message = append(db.pool(), &text(&chat_id, "hello")).await.unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.meta, serde_json::json!({}));

        let stored = get_message(db.pool(), &message.id).await.unwrap().unwrap();
        assert_eq!(stored, message);
    }

    #[tokio::test]
    async fn test_append_rejects_missing_fields() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        let mut missing_sender = text(&chat_id, "hello");
        missing_sender.sender.clear();
        let mut missing_content = text(&chat_id, "hello");
        missing_content.content.clear();
        let mut bad_kind = text(&chat_id, "hello");
        bad_kind.kind = "video".to_string();

        for new in [missing_sender, missing_content, bad_kind] {
            let result = append(db.pool(), &new).await;
            assert!(matches!(result, Err(DatabaseError::Validation(_))));
        }
        assert_eq!(count_messages(db.pool(), &chat_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_unknown_conversation() {
        let db = test_db().await;

        let malformed = append(db.pool(), &text("not-an-id", "hello")).await;
        assert!(matches!(malformed, Err(DatabaseError::NotFound { .. })));

        let missing = Uuid::new_v4().to_string();
        let result = append(db.pool(), &text(&missing, "hello")).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_page_returns_latest_in_order() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        for (i, body) in ["t1", "t2", "t3", "t4"].iter().enumerate() {
            append_at(db.pool(), &text(&chat_id, body), at(i as i64))
                .await
                .unwrap();
        }

        let page = list_page(db.pool(), &chat_id, PageQuery::latest(2)).await.unwrap();
        let bodies: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(bodies, vec!["t3", "t4"]);
    }

    #[tokio::test]
    async fn test_list_page_before_is_strict() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        for (i, body) in ["t1", "t2", "t3", "t4"].iter().enumerate() {
            append_at(db.pool(), &text(&chat_id, body), at(i as i64))
                .await
                .unwrap();
        }

        let query = PageQuery {
            limit: None,
            before: Some(at(2)),
        };
        let page = list_page(db.pool(), &chat_id, query).await.unwrap();
        let bodies: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(bodies, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_list_page_before_rounds_sub_millisecond_up() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;
        append_at(db.pool(), &text(&chat_id, "t1"), at(0)).await.unwrap();

        let just_after = at(0) + chrono::Duration::microseconds(500);
        let page = list_page(
            db.pool(),
            &chat_id,
            PageQuery {
                limit: None,
                before: Some(just_after),
            },
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 1);

        let exact = PageQuery {
            limit: None,
            before: Some(at(0)),
        };
        assert!(list_page(db.pool(), &chat_id, exact).await.unwrap().is_empty());
    }

    #[test]
    fn test_ceil_millis() {
        assert_eq!(ceil_millis(at(0)), at(0).timestamp_millis());
        let nudged = at(0) + chrono::Duration::nanoseconds(1);
        assert_eq!(ceil_millis(nudged), at(0).timestamp_millis() + 1);
    }

    #[tokio::test]
    async fn test_append_with_summary_updates_conversation() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        let (message, chat) = append_with_summary(db.pool(), &text(&chat_id, "hello"))
            .await
            .unwrap();
        assert_eq!(chat.id, chat_id);
        let summary = chat.last_message.unwrap();
        assert_eq!(summary.text, "hello");
        assert_eq!(summary.at, message.created_at);
    }

    #[tokio::test]
    async fn test_append_with_summary_rolls_back_on_summary_failure() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;

        sqlx::query(
            r#"
            CREATE TRIGGER refuse_summary BEFORE UPDATE ON conversations
            BEGIN
                SELECT RAISE(ABORT, 'summary refused');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let result = append_with_summary(db.pool(), &text(&chat_id, "hello")).await;
        assert!(matches!(result, Err(DatabaseError::Sqlx(_))));
        assert_eq!(count_messages(db.pool(), &chat_id).await.unwrap(), 0);

        let chat = crate::conversation::get_conversation(db.pool(), &chat_id)
            .await
            .unwrap();
        assert!(chat.last_message.is_none());
    }

    #[tokio::test]
    async fn test_list_page_malformed_chat_id() {
        let db = test_db().await;
        let result = list_page(db.pool(), "bogus", PageQuery::default()).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_advance_status_is_monotone() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;
        let message = append(db.pool(), &text(&chat_id, "hello")).await.unwrap();

        let change = advance_status(db.pool(), &message.id, MessageStatus::Read)
            .await
            .unwrap()
            .unwrap();
        assert!(change.advanced);
        assert_eq!(change.message.status, MessageStatus::Read);

        let change = advance_status(db.pool(), &message.id, MessageStatus::Delivered)
            .await
            .unwrap()
            .unwrap();
        assert!(!change.advanced);
        assert_eq!(change.message.status, MessageStatus::Read);

        let change = advance_status(db.pool(), &message.id, MessageStatus::Read)
            .await
            .unwrap()
            .unwrap();
        assert!(!change.advanced);
        assert_eq!(change.message.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_advance_status_sequence() {
        let db = test_db().await;
        let chat_id = test_chat(&db).await;
        let message = append(db.pool(), &text(&chat_id, "hello")).await.unwrap();

        let delivered = advance_status(db.pool(), &message.id, MessageStatus::Delivered)
            .await
            .unwrap()
            .unwrap();
        assert!(delivered.advanced);
        assert_eq!(delivered.message.status, MessageStatus::Delivered);

        let read = advance_status(db.pool(), &message.id, MessageStatus::Read)
            .await
            .unwrap()
            .unwrap();
        assert!(read.advanced);
        assert_eq!(read.message.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_advance_status_missing_message() {
        let db = test_db().await;

        let missing = Uuid::new_v4().to_string();
        assert!(advance_status(db.pool(), &missing, MessageStatus::Read)
            .await
            .unwrap()
            .is_none());
        assert!(advance_status(db.pool(), "tmp-123", MessageStatus::Read)
            .await
            .unwrap()
            .is_none());
    }
}
