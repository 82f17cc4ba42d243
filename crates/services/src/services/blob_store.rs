use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::config::{StorageBackendKind, StorageConfig};

pub mod local;
pub mod s3;

pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("blob storage request failed: {0}")]
    Upstream(String),
}

/// Object storage used for todo attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BlobStoreError>;

    /// Removes an object. An object that is already gone counts as deleted.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError>;

    /// A URL granting read access to the object for `expires_in`.
    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, BlobStoreError>;
}

/// Builds the configured backend.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, BlobStoreError> {
    match config.backend {
        StorageBackendKind::Local => {
            let store = LocalBlobStore::new(&config.local_root).await?;
            Ok(Arc::new(store))
        }
        StorageBackendKind::S3 => Ok(Arc::new(S3BlobStore::from_config(&config.s3).await)),
    }
}

/// Object key for an attachment: `todos/{todo}/attachments/{attachment}-{file}`.
pub fn attachment_key(todo_id: Uuid, attachment_id: Uuid, filename: &str) -> String {
    format!(
        "todos/{todo_id}/attachments/{attachment_id}-{}",
        sanitize_filename(filename)
    )
}

/// Keeps the final path segment of `filename` and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
