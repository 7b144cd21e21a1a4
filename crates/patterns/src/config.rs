/// Detection thresholds.
///
/// Slope-like values are per-step price changes as a fraction of the
/// window's mean price; range and margin values are fractions of price.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum samples before any classification is attempted
    pub min_window_len: usize,
    /// Patterns below this confidence are suppressed
    pub min_confidence: f64,
    /// Minimum normalized slope for a trend
    pub trend_min_slope: f64,
    /// Net return at which trend strength saturates at 1.0
    pub trend_full_strength_return: f64,
    /// Minimum normalized slope for each leg of a reversal
    pub reversal_min_leg_slope: f64,
    /// Margin above/below the prior extreme that counts as a breakout
    pub breakout_min_margin: f64,
    /// Minimum recent/baseline volume ratio backing a breakout
    pub breakout_volume_ratio: f64,
    /// Trailing samples excluded from the breakout reference extreme
    pub breakout_reference_tail: usize,
    /// Maximum range fraction for a consolidation
    pub consolidation_max_range: f64,
    /// Maximum absolute normalized slope for a consolidation
    pub consolidation_max_slope: f64,
    /// Recent/baseline volatility ratio that counts as an expansion
    pub volatility_expansion_ratio: f64,
    /// Window length at which the sample-count confidence term reaches 0.5
    pub saturation_half_len: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_window_len: 10,
            min_confidence: 0.6,
            trend_min_slope: 0.001,            // 0.1% per step
            trend_full_strength_return: 0.05,  // 5% move = full strength
            reversal_min_leg_slope: 0.001,
            breakout_min_margin: 0.005,        // 0.5% beyond the extreme
            breakout_volume_ratio: 1.2,
            breakout_reference_tail: 3,
            consolidation_max_range: 0.01,     // 1% total range
            consolidation_max_slope: 0.0005,
            volatility_expansion_ratio: 1.5,
            saturation_half_len: 10.0,
        }
    }
}
