pub mod blob_deletion;
pub mod event_outbox;
pub mod todo;
pub mod todo_attachment;
pub mod todo_category;
pub mod todo_comment;
