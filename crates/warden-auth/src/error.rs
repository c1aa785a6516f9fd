use thiserror::Error;
use warden_store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Credential already in use at another level")]
    DuplicateCredential,

    #[error("Credential must be exactly {expected} digits")]
    MalformedCredential { expected: usize },

    #[error("No credential set at this level")]
    NoCredential,
}

pub type AuthResult<T> = Result<T, AuthError>;
