use std::sync::Arc;

use db::DBService;
use services::services::{
    attachment::AttachmentService, blob_store::BlobStore, category::CategoryService,
    comment::CommentService, config::Config, todo::TodoService,
};

pub mod error;
pub mod http;
pub mod response;
pub mod routes;

/// Shared handles every route reaches through `State`.
#[derive(Clone)]
pub struct AppState {
    todos: TodoService,
    categories: CategoryService,
    comments: CommentService,
    attachments: AttachmentService,
}

impl AppState {
    pub fn new(db: DBService, store: Arc<dyn BlobStore>, config: &Config) -> Self {
        let bucket = config.storage.bucket.clone();
        Self {
            todos: TodoService::new(db.clone(), bucket.clone()),
            categories: CategoryService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            attachments: AttachmentService::new(
                db,
                store,
                bucket,
                config.storage.presign_expiry(),
                config.max_attachment_bytes,
            ),
        }
    }

    pub fn todos(&self) -> &TodoService {
        &self.todos
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    pub fn attachments(&self) -> &AttachmentService {
        &self.attachments
    }
}

#[cfg(test)]
pub(crate) mod test_support;
