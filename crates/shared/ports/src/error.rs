use thiserror::Error;

/// Errors surfaced by state store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Row not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
