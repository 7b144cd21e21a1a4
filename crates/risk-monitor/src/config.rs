use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Critical limits. Warnings fire at `warning_fraction` of each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimitConfig {
    /// Historical 95% VaR as a loss fraction per trade
    pub max_var_95: f64,
    /// Marked drawdown from the equity peak, as a fraction of capital
    pub max_drawdown: f64,
    /// Daily realized loss in account currency
    pub max_daily_loss: Decimal,
    /// Absolute pairwise return correlation between live strategies
    pub max_correlation: f64,
    /// Single-asset share of gross portfolio exposure
    pub max_concentration: f64,
    /// Gross portfolio exposure over equity
    pub max_exposure_fraction: f64,
}

impl Default for RiskLimitConfig {
    fn default() -> Self {
        Self {
            max_var_95: 0.05,          // 5% per-trade tail loss
            max_drawdown: 0.20,        // 20% off the peak
            max_daily_loss: dec!(50000),
            max_correlation: 0.80,
            max_concentration: 0.25,   // 25% in one asset
            max_exposure_fraction: 1.0, // unlevered gross
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMonitorConfig {
    /// Capital base used for exposure and drawdown fractions
    pub initial_capital: Decimal,
    pub limits: RiskLimitConfig,
    /// Warning thresholds sit at this fraction of each critical limit
    pub warning_fraction: f64,
    /// Minimum return observations before VaR and correlation apply
    pub var_min_samples: usize,
    /// Per-strategy realized return history bound
    pub return_history: usize,
    /// Halt a strategy automatically on its critical breaches
    pub auto_halt: bool,
    /// Escalate critical portfolio breaches to an emergency stop
    pub auto_emergency_stop: bool,
    /// Broadcast channel capacity for alerts
    pub alert_buffer: usize,
}

impl Default for RiskMonitorConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(1000000),
            limits: RiskLimitConfig::default(),
            warning_fraction: 0.8,
            var_min_samples: 10,
            return_history: 256,
            auto_halt: true,
            auto_emergency_stop: false,
            alert_buffer: 256,
        }
    }
}
