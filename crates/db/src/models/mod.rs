pub mod attachment;
pub mod blob_deletion;
pub mod category;
pub mod comment;
pub mod event_outbox;
pub mod ids;
pub mod ownership;
pub mod pagination;
pub mod todo;
pub mod todo_query;

#[cfg(test)]
pub(crate) mod test_support;
