use thiserror::Error;

/// Why a single rule could not be evaluated. Faults are isolated: the
/// failing rule is skipped, everything else proceeds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleFault {
    #[error("unknown characteristic '{0}'")]
    UnknownCharacteristic(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("no published performance snapshot")]
    MissingSnapshot,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Duplicate strategy: {0}")]
    DuplicateStrategy(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Rule '{rule}' failed for {strategy_id}: {fault}")]
    RuleEvaluation {
        strategy_id: String,
        rule: String,
        fault: RuleFault,
    },
}

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;
