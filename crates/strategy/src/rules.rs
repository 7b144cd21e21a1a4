use proteus_analyzer::MarketPerformanceMetrics;
use proteus_patterns::{Comparator, DetectedPattern};
use serde::{Deserialize, Serialize};

use crate::error::RuleFault;

/// A value a rule condition can observe. Closed set, evaluated by a pure
/// interpreter; there is no reflection over arbitrary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Observable {
    /// Pattern strength in [0, 1]
    Strength,
    /// Pattern confidence in [0, 1]
    Confidence,
    /// Named entry in the pattern's characteristics map
    Characteristic(String),
    /// Field of the strategy's latest published performance snapshot
    Metric(MetricField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricField {
    TotalReturn,
    SharpeRatio,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
}

impl MetricField {
    pub fn read(&self, snapshot: &MarketPerformanceMetrics) -> f64 {
        match self {
            MetricField::TotalReturn => snapshot.total_return,
            MetricField::SharpeRatio => snapshot.sharpe_ratio,
            MetricField::MaxDrawdown => snapshot.max_drawdown,
            MetricField::WinRate => snapshot.win_rate,
            MetricField::ProfitFactor => snapshot.profit_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub observable: Observable,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl RuleCondition {
    /// Evaluates against one pattern and the optional latest snapshot.
    pub fn holds(
        &self,
        pattern: &DetectedPattern,
        snapshot: Option<&MarketPerformanceMetrics>,
    ) -> Result<bool, RuleFault> {
        let value = match &self.observable {
            Observable::Strength => pattern.strength,
            Observable::Confidence => pattern.confidence,
            Observable::Characteristic(name) => *pattern
                .characteristics
                .get(name)
                .ok_or_else(|| RuleFault::UnknownCharacteristic(name.clone()))?,
            Observable::Metric(field) => {
                let snapshot = snapshot.ok_or(RuleFault::MissingSnapshot)?;
                field.read(snapshot)
            }
        };
        Ok(self.comparator.evaluate(value, self.threshold))
    }
}

/// Unscaled parameter nudge. The engine scales by learning rate and
/// pattern strength before applying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDelta {
    pub parameter: String,
    pub delta: f64,
}

/// Condition set and the deltas it proposes. Fires only when every
/// condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRule {
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub deltas: Vec<ParameterDelta>,
}

impl AdaptationRule {
    pub fn fires(
        &self,
        pattern: &DetectedPattern,
        snapshot: Option<&MarketPerformanceMetrics>,
    ) -> Result<bool, RuleFault> {
        for condition in &self.conditions {
            if !condition.holds(pattern, snapshot)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
