//! HTTP and WebSocket server for the one-to-one chat backend.
//!
//! Serves the REST API, uploaded images and the realtime `/socket` channel.

mod blob;
mod config;
mod error;
mod extract;
mod routes;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use database::Database;
use messaging::{Gateway, SessionRegistry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::blob::LocalBlobStore;
use crate::config::{Config, ConfigError};
use crate::state::AppState;

/// Upload body limit.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chat_server=info,messaging=info,database=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, gateway = ?config.gateway, "Starting chat server");

    // Connect to database
    let db = Database::connect_with_pool_size(&config.database_url, config.pool_size).await?;
    db.migrate().await?;

    // Build application state
    let blobs = LocalBlobStore::new(&config.uploads_dir);
    tokio::fs::create_dir_all(blobs.dir()).await?;
    let gateway = Gateway::new(db, Arc::new(SessionRegistry::new()), config.gateway.clone());
    let state = AppState::new(gateway, Arc::new(blobs));

    // Build router
    let app = routes::router()
        .nest_service(
            LocalBlobStore::PUBLIC_PREFIX,
            ServeDir::new(&config.uploads_dir),
        )
        .layer(cors_layer(&config.client_origin)?)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Chat server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let origin = HeaderValue::from_str(origin.trim())
        .map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))?;
    Ok(layer.allow_origin(origin))
}
