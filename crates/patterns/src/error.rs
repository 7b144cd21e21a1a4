use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("Insufficient data: window holds {actual} samples, {required} required")]
    InsufficientData { required: usize, actual: usize },
}

pub type DetectResult<T> = std::result::Result<T, DetectError>;
