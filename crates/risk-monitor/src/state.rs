use proteus_core::{StrategyId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskScope {
    Portfolio,
    Strategy(StrategyId),
}

impl RiskScope {
    pub fn key(&self) -> &str {
        match self {
            RiskScope::Portfolio => "portfolio",
            RiskScope::Strategy(id) => id,
        }
    }
}

impl std::fmt::Display for RiskScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Point-in-time risk measurements for one scope.
///
/// Fractions are relative to the configured capital base; drawdowns are
/// current distance from the peak, not all-time maxima.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub scope: RiskScope,
    /// Sum of absolute position notionals at current marks
    pub gross_exposure: Decimal,
    /// Gross exposure over portfolio equity
    pub exposure_fraction: f64,
    /// Distance below the realized-PnL peak
    pub realized_drawdown: f64,
    /// Distance below the marked (realized + unrealized) peak
    pub unrealized_drawdown: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
    /// Largest absolute pairwise correlation against live strategies
    pub max_abs_correlation: f64,
    /// Strategy scope: share of gross portfolio exposure.
    /// Portfolio scope: largest single-asset share.
    pub concentration: f64,
    pub daily_pnl: Decimal,
    pub updated_at: Timestamp,
}
