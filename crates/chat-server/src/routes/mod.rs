//! Route handlers for the chat server.

pub mod chats;
pub mod health;
pub mod media;
pub mod socket;
pub mod stats;
pub mod users;

use axum::routing::{get, post, put};
use axum::Router;
use serde::Serialize;

use crate::state::AppState;

/// Success envelope: `{"ok": true, ...body}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self { ok: true, body }
    }
}

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health::health))
        .route("/api/stats", get(stats::stats))
        // Users
        .route("/api/users/upsert", post(users::upsert))
        .route("/api/users/:id", put(users::update))
        // Conversations and messages
        .route("/api/chats/one-to-one", post(chats::one_to_one))
        .route("/api/chats/for/:phone", get(chats::for_participant))
        .route(
            "/api/chats/:chat_id/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        // Media
        .route("/api/media/upload-image", post(media::upload_image))
        // Realtime
        .route("/socket", get(socket::socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let app = router().with_state(testing::state().await);
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_json_body_uses_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/users/upsert")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["message"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn test_missing_content_type_uses_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chats/one-to-one")
            .body(Body::from(r#"{"a":"555-0100","b":"555-0200"}"#))
            .unwrap();

        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_bad_query_string_uses_envelope() {
        let request = Request::builder()
            .uri("/api/chats/0b8f4a8e-2a57-4c43-9d0e-3f1f8a4f1c11/messages?limit=abc")
            .body(Body::empty())
            .unwrap();

        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["message"].as_str().unwrap().contains("query string"));
    }

    #[tokio::test]
    async fn test_upload_without_multipart_uses_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/media/upload-image")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_success_uses_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chats/one-to-one")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"a":"555-0100","b":"555-0200"}"#))
            .unwrap();

        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["chat"]["participants"][1], "555-0200");
    }
}
