//! Storage for uploaded images.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;
use tracing::info;

/// Where a stored blob can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Public URL path of the blob.
    pub url: String,
    /// Generated file name.
    pub filename: String,
}

/// Errors that can occur while storing a blob.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("No file uploaded")]
    Empty,

    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque store for uploaded media.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return where they can be fetched from.
    async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<StoredBlob, BlobError>;
}

/// Writes blobs to a local directory served under a public prefix.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalBlobStore {
    pub const PUBLIC_PREFIX: &'static str = "/public/uploads";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: Self::PUBLIC_PREFIX.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<StoredBlob, BlobError> {
        if bytes.is_empty() {
            return Err(BlobError::Empty);
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = generate_filename(original_name);
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        info!(filename = %filename, size = bytes.len(), "Stored upload");
        Ok(StoredBlob {
            url: format!("{}/{}", self.public_prefix, filename),
            filename,
        })
    }
}

/// `<millis>-<7 random chars><ext>`, keeping the original extension when it
/// is plain alphanumeric.
fn generate_filename(original_name: Option<&str>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();

    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        extension(original_name)
    )
}

fn extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".bin".to_string())
}
