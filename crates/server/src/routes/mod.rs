pub mod attachments;
pub mod categories;
pub mod comments;
pub mod health;
pub mod todos;
