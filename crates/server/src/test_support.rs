use std::sync::Arc;

use db::DBService;
use services::services::{blob_store::LocalBlobStore, config::Config};
use tempfile::TempDir;

use crate::AppState;

/// Application state over an in-memory database and a throwaway blob root.
/// Keep the returned directory alive for the duration of the test.
pub(crate) async fn setup_state() -> (TempDir, AppState) {
    let blob_root = TempDir::new().unwrap();
    let db = DBService::new_in_memory().await.unwrap();
    let store = Arc::new(LocalBlobStore::new(blob_root.path()).await.unwrap());
    let state = AppState::new(db, store, &Config::default());
    (blob_root, state)
}
