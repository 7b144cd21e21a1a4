use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

pub type RiskResult<T> = std::result::Result<T, RiskError>;
