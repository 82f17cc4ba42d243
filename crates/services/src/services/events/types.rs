use db::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}
