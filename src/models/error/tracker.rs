use super::{ProviderError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
