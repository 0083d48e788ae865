//! User profile operations, keyed by phone number.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{from_millis, User};
use crate::validation::{validate_name, validate_phone_number};

const SELECT_COLUMNS: &str = "id, name, phone_number, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: String,
    name: String,
    phone_number: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            phone_number: row.phone_number,
            created_at: from_millis("users.created_at", row.created_at)?,
            updated_at: from_millis("users.updated_at", row.updated_at)?,
        })
    }
}

/// Fields that may change in [`update_user`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate<'a> {
    pub name: Option<&'a str>,
    pub phone_number: Option<&'a str>,
}

/// Create a user, or rename the existing user with the same phone number.
pub async fn upsert_user(pool: &SqlitePool, name: &str, phone_number: &str) -> Result<User> {
    let name = validate_name(name)?;
    let phone_number = validate_phone_number(phone_number)?;
    let now = Utc::now().timestamp_millis();

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (id, name, phone_number, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(phone_number) DO UPDATE SET
            name = excluded.name,
            updated_at = excluded.updated_at
        RETURNING {}
        "#,
        SELECT_COLUMNS
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(phone_number)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

/// Update a user's name and/or phone number by ID.
pub async fn update_user(pool: &SqlitePool, id: &str, update: UserUpdate<'_>) -> Result<User> {
    let name = update.name.map(validate_name).transpose()?;
    let phone_number = update.phone_number.map(validate_phone_number).transpose()?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            phone_number = COALESCE(?, phone_number),
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        SELECT_COLUMNS
    ))
    .bind(name)
    .bind(phone_number)
    .bind(Utc::now().timestamp_millis())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: phone_number.unwrap_or_default().to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?
    .ok_or_else(|| DatabaseError::not_found("User", id))?;

    row.try_into()
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
