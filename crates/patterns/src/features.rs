use proteus_core::SampleWindow;
use proteus_metrics::sample_volatility;

/// Signal-to-noise values above this are treated as saturated
const SNR_CAP: f64 = 10.0;

/// Per-window feature bundle, computed once and shared by all
/// classifiers.
///
/// Slopes are least-squares per-step changes normalized by the window's
/// mean price; volatilities are sample deviations of log returns.
#[derive(Debug, Clone)]
pub struct WindowFeatures {
    pub len: usize,
    /// Price series in time order, retained for reference-level checks
    pub prices: Vec<f64>,
    pub mean_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub last_price: f64,
    /// last/first - 1
    pub net_return: f64,
    /// Normalized regression slope over the whole window
    pub slope: f64,
    /// Normalized slopes of the first and second half
    pub half_slopes: [f64; 2],
    /// Normalized slopes of each third
    pub sub_slopes: [f64; 3],
    /// Log-return volatility of each third
    pub sub_vols: [f64; 3],
    /// Log-return volatility of the whole window
    pub volatility: f64,
    /// |net log return| against the volatility noise scale, capped
    pub snr: f64,
    /// (max - min) / mean price
    pub range_fraction: f64,
    /// Indices of local price maxima (1-sample neighborhood)
    pub swing_highs: Vec<usize>,
    /// Indices of local price minima
    pub swing_lows: Vec<usize>,
    /// Normalized regression slope of volume
    pub volume_trend: f64,
    /// Mean volume of the last third against the first two thirds
    pub volume_ratio: f64,
    pub span_secs: i64,
}

impl WindowFeatures {
    pub fn compute(window: &SampleWindow) -> Self {
        let prices = window.prices();
        let volumes = window.volumes();
        let n = prices.len();

        let mean_price = if n > 0 {
            prices.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let first_price = prices.first().copied().unwrap_or(0.0);
        let last_price = prices.last().copied().unwrap_or(0.0);

        let net_return = if first_price > 0.0 {
            last_price / first_price - 1.0
        } else {
            0.0
        };

        let log_returns = log_returns(&prices);
        let volatility = sample_volatility(&log_returns).unwrap_or(0.0);

        let signal: f64 = log_returns.iter().sum();
        let noise = volatility * (log_returns.len() as f64).sqrt();
        let snr = if noise > f64::EPSILON {
            (signal.abs() / noise).min(SNR_CAP)
        } else if signal.abs() > f64::EPSILON {
            SNR_CAP
        } else {
            0.0
        };

        let t = n / 3;
        let h = n / 2;
        let sub_slopes = [
            normalized_slope(&prices[..t.min(n)], mean_price),
            normalized_slope(&prices[t.min(n)..(2 * t).min(n)], mean_price),
            normalized_slope(&prices[(2 * t).min(n)..], mean_price),
        ];
        let sub_vols = [
            slice_volatility(&prices[..t.min(n)]),
            slice_volatility(&prices[t.min(n)..(2 * t).min(n)]),
            slice_volatility(&prices[(2 * t).min(n)..]),
        ];
        let half_slopes = [
            normalized_slope(&prices[..h], mean_price),
            normalized_slope(&prices[h..], mean_price),
        ];

        let (swing_highs, swing_lows) = swings(&prices);

        let mean_volume = if n > 0 {
            volumes.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        let volume_trend = if mean_volume > 0.0 {
            regression_slope(&volumes) / mean_volume
        } else {
            0.0
        };
        let baseline_volume = mean_of(&volumes[..(2 * t).min(n)]);
        let recent_volume = mean_of(&volumes[(2 * t).min(n)..]);
        let volume_ratio = if baseline_volume > 0.0 {
            recent_volume / baseline_volume
        } else {
            1.0
        };

        let range_fraction = if mean_price > 0.0 && max_price.is_finite() && min_price.is_finite()
        {
            (max_price - min_price) / mean_price
        } else {
            0.0
        };

        let slope = normalized_slope(&prices, mean_price);

        Self {
            len: n,
            prices,
            mean_price,
            min_price,
            max_price,
            last_price,
            net_return,
            slope,
            half_slopes,
            sub_slopes,
            sub_vols,
            volatility,
            snr,
            range_fraction,
            swing_highs,
            swing_lows,
            volume_trend,
            volume_ratio,
            span_secs: window.span().num_seconds(),
        }
    }

    /// Baseline volatility: mean of the first two thirds
    pub fn baseline_volatility(&self) -> f64 {
        (self.sub_vols[0] + self.sub_vols[1]) / 2.0
    }
}

/// Least-squares slope of values against their index
fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean_i = (n as f64 - 1.0) / 2.0;
    let mean_v = values.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_i = 0.0;
    for (i, v) in values.iter().enumerate() {
        let di = i as f64 - mean_i;
        cov += di * (v - mean_v);
        var_i += di * di;
    }
    if var_i == 0.0 { 0.0 } else { cov / var_i }
}

fn normalized_slope(values: &[f64], mean_price: f64) -> f64 {
    if mean_price > 0.0 {
        regression_slope(values) / mean_price
    } else {
        0.0
    }
}

fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|pair| {
            if pair[0] > 0.0 && pair[1] > 0.0 {
                (pair[1] / pair[0]).ln()
            } else {
                0.0
            }
        })
        .collect()
}

fn slice_volatility(prices: &[f64]) -> f64 {
    sample_volatility(&log_returns(prices)).unwrap_or(0.0)
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Local extrema with a 1-sample neighborhood
fn swings(prices: &[f64]) -> (Vec<usize>, Vec<usize>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for i in 1..prices.len().saturating_sub(1) {
        if prices[i] > prices[i - 1] && prices[i] > prices[i + 1] {
            highs.push(i);
        } else if prices[i] < prices[i - 1] && prices[i] < prices[i + 1] {
            lows.push(i);
        }
    }
    (highs, lows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proteus_core::{MarketSample, Timeframe};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn window(prices: &[f64]) -> SampleWindow {
        let samples = prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                MarketSample::new(
                    Decimal::from_f64_retain(*p).unwrap(),
                    dec!(10),
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, i as u32, 0).unwrap(),
                )
            })
            .collect();
        SampleWindow::from_samples("BTC/USD", Timeframe::M1, samples)
    }

    #[test]
    fn test_linear_series_slope() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let features = WindowFeatures::compute(&window(&prices));

        // one unit per step over a 104.5 mean
        assert!((features.slope - 1.0 / 104.5).abs() < 1e-9);
        assert!(features.sub_slopes.iter().all(|s| *s > 0.0));
        assert!(features.half_slopes.iter().all(|s| *s > 0.0));
        assert!((features.net_return - 0.09).abs() < 1e-9);
    }

    #[test]
    fn test_swing_detection() {
        let features = WindowFeatures::compute(&window(&[100.0, 102.0, 101.0, 103.0, 100.0]));
        assert_eq!(features.swing_highs, vec![1, 3]);
        assert_eq!(features.swing_lows, vec![2]);
    }

    #[test]
    fn test_volume_ratio_flat_volume() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let features = WindowFeatures::compute(&window(&prices));
        assert!((features.volume_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snr_saturates_on_clean_signal() {
        // constant growth rate has zero log-return volatility
        let prices: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let features = WindowFeatures::compute(&window(&prices));
        assert!((features.snr - 10.0).abs() < 1e-9);
    }
}
