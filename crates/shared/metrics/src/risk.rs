use std::cmp::Ordering;

use crate::error::{MetricsError, MetricsResult};

/// Maximum peak-to-trough drawdown over an equity curve, as a fraction
/// of the peak. Series shorter than 2 points have no drawdown.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let mut peak = equity[0];
    let mut max_dd = 0.0;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Historical value-at-risk at the given confidence level, as a positive
/// loss fraction. With no losses in the tail the VaR is 0.0.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> MetricsResult<f64> {
    let sorted = sorted_ascending(returns, "value_at_risk")?;
    let idx = tail_index(sorted.len(), confidence);
    Ok((-sorted[idx]).max(0.0))
}

/// Expected shortfall (CVaR): mean loss of the tail at or below the VaR
/// cut, as a positive fraction.
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> MetricsResult<f64> {
    let sorted = sorted_ascending(returns, "expected_shortfall")?;
    let idx = tail_index(sorted.len(), confidence);
    let tail = &sorted[..=idx];
    let tail_mean = tail.iter().sum::<f64>() / tail.len() as f64;
    Ok((-tail_mean).max(0.0))
}

/// Pearson correlation over the common length of two series.
///
/// A degenerate (constant) series carries no co-movement signal and
/// maps to 0.0.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> MetricsResult<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return Err(MetricsError::NoData {
            required: 2,
            actual: n,
        });
    }
    let a = &a[..n];
    let b = &b[..n];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(cov / denom)
}

fn sorted_ascending(returns: &[f64], metric: &'static str) -> MetricsResult<Vec<f64>> {
    if returns.is_empty() {
        return Err(MetricsError::InsufficientData(metric));
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    Ok(sorted)
}

/// Index of the tail cut: floor((1 - confidence) * n), clamped into range.
/// The epsilon keeps exact boundaries like (1 - 0.9) * 10 from flooring low.
fn tail_index(n: usize, confidence: f64) -> usize {
    let idx = ((1.0 - confidence) * n as f64 + 1e-9).floor() as usize;
    idx.min(n - 1)
}
