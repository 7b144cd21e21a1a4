//! Proteus Metrics
//!
//! Pure statistical primitives over `f64` series. No state, no clocks,
//! no I/O; callers own windowing and unit conventions.
//!
//! Conventions:
//! - Volatility and correlation use the N-1 sample estimator
//! - Ratio metrics return [`MetricsError::NoData`] below 2 observations
//!   rather than a misleading zero
//! - Tail metrics (VaR, expected shortfall) are reported as positive
//!   loss fractions

mod error;
mod returns;
mod risk;

pub use error::{MetricsError, MetricsResult};
pub use returns::{
    SECONDS_PER_YEAR, annualized_return, mean, profit_factor, sample_volatility, sharpe_ratio,
    win_rate,
};
pub use risk::{expected_shortfall, max_drawdown, pearson_correlation, value_at_risk};
