//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use messaging::Gateway;

use crate::blob::BlobStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Realtime gateway; also owns the database handle.
    pub gateway: Gateway,
    /// Upload storage.
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Create new application state.
    pub fn new(gateway: Gateway, blobs: Arc<dyn BlobStore>) -> Self {
        Self { gateway, blobs }
    }

    pub fn db(&self) -> &Database {
        self.gateway.db()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use database::Database;
    use messaging::{Gateway, GatewayConfig, SessionRegistry};

    use super::AppState;
    use crate::blob::LocalBlobStore;

    /// State backed by a fresh in-memory database.
    pub async fn state_with(config: GatewayConfig) -> AppState {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let gateway = Gateway::new(db, Arc::new(SessionRegistry::new()), config);
        let uploads = std::env::temp_dir().join(format!("chat-server-test-{}", std::process::id()));
        AppState::new(gateway, Arc::new(LocalBlobStore::new(uploads)))
    }

    pub async fn state() -> AppState {
        state_with(GatewayConfig::default()).await
    }
}
