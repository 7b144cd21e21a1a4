use std::collections::BTreeMap;

use proteus_core::{AssetId, Timeframe, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace under which deterministic pattern ids are derived
const PATTERN_NAMESPACE: Uuid = Uuid::from_u128(0x5052_4F54_4555_5350_4154_5445_524E_5331);

/// The market structure a pattern describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Trend,
    Reversal,
    Breakout,
    Consolidation,
    Volatility,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Trend => "trend",
            PatternKind::Reversal => "reversal",
            PatternKind::Breakout => "breakout",
            PatternKind::Consolidation => "consolidation",
            PatternKind::Volatility => "volatility",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operator used by trigger conditions and adaptation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparator {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::GreaterOrEqual => value >= threshold,
            Comparator::LessThan => value < threshold,
            Comparator::LessOrEqual => value <= threshold,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Comparator::GreaterThan => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessThan => "<",
            Comparator::LessOrEqual => "<=",
        };
        write!(f, "{symbol}")
    }
}

/// A named observable crossing a threshold, recorded as evidence for
/// why a pattern fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub observable: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl TriggerCondition {
    pub fn new(observable: impl Into<String>, comparator: Comparator, threshold: f64) -> Self {
        Self {
            observable: observable.into(),
            comparator,
            threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeDirection {
    Up,
    Down,
    Sideways,
}

/// What the pattern implies for the near future
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub direction: OutcomeDirection,
    /// Expected favorable move as a price fraction
    pub magnitude: f64,
    /// Probability the outcome materializes, in [0, 1]
    pub probability: f64,
    /// Favorable magnitude against the adverse move estimate
    pub risk_reward: f64,
}

/// One classified market structure. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub id: Uuid,
    pub kind: PatternKind,
    pub asset: AssetId,
    pub timeframe: Timeframe,
    /// Normalized magnitude of the structure, in [0, 1]
    pub strength: f64,
    /// Detection confidence, in [0, 1]
    pub confidence: f64,
    /// Time covered by the classified window, in seconds
    pub duration_secs: i64,
    /// Ordered numeric evidence backing the classification
    pub characteristics: BTreeMap<String, f64>,
    pub trigger_conditions: Vec<TriggerCondition>,
    pub expected_outcome: ExpectedOutcome,
    /// Timestamp of the window's last sample, never wall clock
    pub detected_at: Timestamp,
}

impl DetectedPattern {
    /// Content-derived id: identical windows yield identical ids, so
    /// redetection after a replay dedupes instead of double counting.
    pub fn deterministic_id(
        asset: &str,
        timeframe: Timeframe,
        kind: PatternKind,
        window_end: Timestamp,
    ) -> Uuid {
        let name = format!(
            "{}|{}|{}|{}",
            asset,
            timeframe.as_str(),
            kind.as_str(),
            window_end.timestamp_millis()
        );
        Uuid::new_v5(&PATTERN_NAMESPACE, name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_comparator_evaluation() {
        assert!(Comparator::GreaterThan.evaluate(1.0, 0.5));
        assert!(!Comparator::GreaterThan.evaluate(0.5, 0.5));
        assert!(Comparator::GreaterOrEqual.evaluate(0.5, 0.5));
        assert!(Comparator::LessThan.evaluate(-0.1, 0.0));
        assert!(Comparator::LessOrEqual.evaluate(0.0, 0.0));
    }

    #[test]
    fn test_deterministic_id_stable() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = DetectedPattern::deterministic_id("BTC/USD", Timeframe::M5, PatternKind::Trend, end);
        let b = DetectedPattern::deterministic_id("BTC/USD", Timeframe::M5, PatternKind::Trend, end);
        assert_eq!(a, b);
    }

    #[test]
    fn test_deterministic_id_varies_by_content() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let trend =
            DetectedPattern::deterministic_id("BTC/USD", Timeframe::M5, PatternKind::Trend, end);
        let breakout =
            DetectedPattern::deterministic_id("BTC/USD", Timeframe::M5, PatternKind::Breakout, end);
        let other_asset =
            DetectedPattern::deterministic_id("ETH/USD", Timeframe::M5, PatternKind::Trend, end);
        assert_ne!(trend, breakout);
        assert_ne!(trend, other_asset);
    }
}
