use super::{ProviderError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
