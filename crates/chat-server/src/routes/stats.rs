//! Directory statistics.

use axum::extract::State;
use axum::Json;
use database::{conversation, user};
use serde::Serialize;

use super::Envelope;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub user_count: i64,
    pub conversation_count: i64,
}

/// Get user and conversation counts as JSON.
pub async fn stats(State(state): State<AppState>) -> Result<Json<Envelope<Stats>>> {
    let pool = state.db().pool();

    let user_count = user::count_users(pool).await?;
    let conversation_count = conversation::count_conversations(pool).await?;

    Ok(Json(Envelope::ok(Stats {
        user_count,
        conversation_count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;

    #[tokio::test]
    async fn test_stats_counts_directory() {
        let state = testing::state().await;
        let pool = state.db().pool();
        user::upsert_user(pool, "Ann", "555-0100").await.unwrap();
        conversation::find_or_create_one_to_one(pool, "555-0100", "555-0200")
            .await
            .unwrap();
        conversation::find_or_create_one_to_one(pool, "555-0200", "555-0100")
            .await
            .unwrap();

        let Json(body) = stats(State(state)).await.unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["userCount"], 1);
        assert_eq!(value["conversationCount"], 1);
    }
}
