//! Health check endpoint.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Envelope;

#[derive(Serialize)]
pub struct Health {
    pub service: &'static str,
    pub time: DateTime<Utc>,
}

/// Health check endpoint.
pub async fn health() -> Json<Envelope<Health>> {
    Json(Envelope::ok(Health {
        service: "chat-server",
        time: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_envelope() {
        let Json(body) = health().await;
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["service"], "chat-server");
        assert!(value["time"].is_string());
    }
}
