use crate::error::{MetricsError, MetricsResult};

/// Seconds in a trading year (365.25 days)
pub const SECONDS_PER_YEAR: f64 = 31_557_600.0;

/// Guard below which a volatility is treated as zero
const VOL_EPSILON: f64 = 1e-12;

/// Arithmetic mean of a series
pub fn mean(values: &[f64]) -> MetricsResult<f64> {
    if values.is_empty() {
        return Err(MetricsError::NoData {
            required: 1,
            actual: 0,
        });
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (N-1 denominator)
pub fn sample_volatility(values: &[f64]) -> MetricsResult<f64> {
    if values.len() < 2 {
        return Err(MetricsError::NoData {
            required: 2,
            actual: values.len(),
        });
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Ok(variance.sqrt())
}

/// Per-period Sharpe ratio: (mean - risk_free) / volatility.
///
/// A flat series has no risk premium to price, so zero volatility maps
/// to 0.0 instead of infinity. Callers annualize by observation frequency.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> MetricsResult<f64> {
    if returns.len() < 2 {
        return Err(MetricsError::NoData {
            required: 2,
            actual: returns.len(),
        });
    }
    let m = returns.iter().sum::<f64>() / returns.len() as f64;
    let vol = sample_volatility(returns)?;
    if vol < VOL_EPSILON {
        return Ok(0.0);
    }
    Ok((m - risk_free_rate) / vol)
}

/// Compound annualization of a total return over an elapsed span.
///
/// Returns 0.0 when the span is not positive, and -1.0 for a total
/// wipeout (geometric growth is undefined below -100%).
pub fn annualized_return(total_return: f64, elapsed_secs: f64) -> f64 {
    let years = elapsed_secs / SECONDS_PER_YEAR;
    if years <= 0.0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Fraction of strictly positive returns
pub fn win_rate(returns: &[f64]) -> MetricsResult<f64> {
    if returns.is_empty() {
        return Err(MetricsError::NoData {
            required: 1,
            actual: 0,
        });
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    Ok(wins as f64 / returns.len() as f64)
}

/// Gross profit over gross loss.
///
/// A lossless series with profits is infinitely favorable; an empty or
/// all-zero series has no factor and maps to 0.0.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let gross_loss: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| -r).sum();

    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}
