use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{TodoPriority, TodoStatus};

pub const EVENT_TODO_CREATED: &str = "todo_created";
pub const EVENT_TODO_UPDATED: &str = "todo_updated";
pub const EVENT_TODO_DELETED: &str = "todo_deleted";

pub const EVENT_CATEGORY_CREATED: &str = "category_created";
pub const EVENT_CATEGORY_UPDATED: &str = "category_updated";
pub const EVENT_CATEGORY_DELETED: &str = "category_deleted";

pub const EVENT_COMMENT_ADDED: &str = "comment_added";
pub const EVENT_COMMENT_UPDATED: &str = "comment_updated";
pub const EVENT_COMMENT_DELETED: &str = "comment_deleted";

pub const EVENT_ATTACHMENT_UPLOADED: &str = "attachment_uploaded";
pub const EVENT_ATTACHMENT_DELETED: &str = "attachment_deleted";

pub const ENTITY_TODO: &str = "todo";
pub const ENTITY_CATEGORY: &str = "category";
pub const ENTITY_COMMENT: &str = "comment";
pub const ENTITY_ATTACHMENT: &str = "attachment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoEventPayload {
    pub todo_id: Uuid,
    pub title: String,
    pub category_id: Option<Uuid>,
    pub priority: TodoPriority,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEventPayload {
    pub category_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEventPayload {
    pub comment_id: Uuid,
    pub todo_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentEventPayload {
    pub attachment_id: Uuid,
    pub todo_id: Uuid,
    pub name: String,
    pub file_size: i64,
}
