use db::{
    DbErr,
    models::{
        ownership::{EntityKind, OwnershipError},
        todo::TodoError,
    },
    validation::ValidationError,
};
use thiserror::Error;

use super::{blob_store::BlobStoreError, hierarchy::HierarchyError};

#[derive(Debug, Error)]
pub enum TodoServiceError {
    #[error(transparent)]
    Database(DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(EntityKind),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error("Todo was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: i32, actual: i32 },
    #[error(transparent)]
    BlobStore(#[from] BlobStoreError),
}

pub type Result<T> = std::result::Result<T, TodoServiceError>;

/// Database failures are logged where they enter the service layer. The
/// record inherits the calling workflow's span, so it names the operation,
/// the owner and the entity being touched.
impl From<DbErr> for TodoServiceError {
    fn from(err: DbErr) -> Self {
        tracing::error!(error = %err, "database operation failed");
        Self::Database(err)
    }
}

impl From<OwnershipError> for TodoServiceError {
    fn from(err: OwnershipError) -> Self {
        match err {
            OwnershipError::NotFound(kind) => Self::NotFound(kind),
            OwnershipError::Database(err) => Self::from(err),
        }
    }
}

impl From<TodoError> for TodoServiceError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::Database(err) => Self::from(err),
            TodoError::NotFound => Self::NotFound(EntityKind::Todo),
            TodoError::Conflict { expected, actual } => Self::Conflict { expected, actual },
        }
    }
}
