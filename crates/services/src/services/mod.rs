pub mod attachment;
pub mod blob_deletion;
pub mod blob_store;
pub mod category;
pub mod comment;
pub mod config;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod todo;

#[cfg(test)]
pub(crate) mod test_support;
