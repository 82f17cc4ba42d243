//! Filesystem blob store. Objects live at `{root}/{bucket}/{key}`.

use std::{
    path::{Component, Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use super::{BlobStore, BlobStoreError};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Opens a store rooted at `root`, creating the directory when missing.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, BlobStoreError> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, BlobStoreError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            let safe = !part.is_empty()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)));
            if !safe {
                return Err(BlobStoreError::InvalidKey(part.to_string()));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BlobStoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, BlobStoreError> {
        let path = self.object_path(bucket, key)?;
        if !fs::try_exists(&path).await? {
            return Err(BlobStoreError::Upstream(format!("object {key} does not exist")));
        }
        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!("file://{}?expires={expires_at}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn put_presign_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        store
            .put("uploads", "todos/a/attachments/b-notes.txt", b"hi".to_vec(), "text/plain")
            .await
            .unwrap();
        let stored = store.root().join("uploads/todos/a/attachments/b-notes.txt");
        assert_eq!(std::fs::read(&stored).unwrap(), b"hi");

        let url = store
            .presigned_url(
                "uploads",
                "todos/a/attachments/b-notes.txt",
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("b-notes.txt?expires="));

        store
            .delete("uploads", "todos/a/attachments/b-notes.txt")
            .await
            .unwrap();
        assert!(!stored.exists());
        // Already gone.
        store
            .delete("uploads", "todos/a/attachments/b-notes.txt")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        for key in ["../outside.txt", "/etc/passwd", ""] {
            let err = store
                .put("uploads", key, Vec::new(), "text/plain")
                .await
                .unwrap_err();
            assert!(matches!(err, BlobStoreError::InvalidKey(_)));
        }
        assert!(matches!(
            store.delete("..", "x").await.unwrap_err(),
            BlobStoreError::InvalidKey(_)
        ));
    }
}
