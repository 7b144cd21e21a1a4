use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("No data for strategy {strategy_id}: {trades} closed trades, 2 required")]
    NoData { strategy_id: String, trades: u64 },
}

pub type AnalyzerResult<T> = std::result::Result<T, AnalyzerError>;
