use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secret store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
