use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Not enough observations: need at least {required}, got {actual}")]
    NoData { required: usize, actual: usize },

    #[error("Empty series for {0}")]
    InsufficientData(&'static str),
}

pub type MetricsResult<T> = std::result::Result<T, MetricsError>;
