use proteus_analyzer::MarketPerformanceMetrics;
use proteus_core::{StrategyId, Timestamp};
use proteus_ports::{AdaptationRow, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleFault;

/// One parameter's movement inside an adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAdjustment {
    pub parameter: String,
    /// Summed scaled delta the rules asked for
    pub requested_delta: f64,
    /// Delta that survived clamping
    pub applied_delta: f64,
    pub clamped: bool,
}

/// Audit entry for one applied adaptation. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    pub record_id: Uuid,
    pub strategy_id: StrategyId,
    pub timestamp: Timestamp,
    /// Patterns that contributed signal, deduplicated by id
    pub pattern_ids: Vec<Uuid>,
    pub adjustments: Vec<ParameterAdjustment>,
    /// True when any adjustment hit a bound
    pub clamped: bool,
    /// Performance snapshot current at application time
    pub snapshot: Option<MarketPerformanceMetrics>,
}

impl AdaptationRecord {
    /// Persistence row; adjustments ride along as JSON.
    pub fn to_row(&self) -> StoreResult<AdaptationRow> {
        Ok(AdaptationRow {
            record_id: self.record_id,
            strategy_id: self.strategy_id.clone(),
            timestamp: self.timestamp,
            pattern_ids: self.pattern_ids.clone(),
            clamped: self.clamped,
            deltas_json: serde_json::to_string(&self.adjustments)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
        })
    }
}

/// An isolated rule failure: the rule was skipped, everything else ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub strategy_id: StrategyId,
    pub rule: String,
    pub fault: RuleFault,
}

/// Outcome of one adaptation round.
#[derive(Debug, Clone, Default)]
pub struct AdaptationReport {
    pub applied: Vec<AdaptationRecord>,
    /// Strategies rate limited this round; their signal is queued
    pub deferred: Vec<StrategyId>,
    pub failures: Vec<RuleFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_record_to_row_serializes_adjustments() {
        let record = AdaptationRecord {
            record_id: Uuid::new_v4(),
            strategy_id: "alpha".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            pattern_ids: vec![Uuid::new_v4()],
            adjustments: vec![ParameterAdjustment {
                parameter: "max_position_size".to_string(),
                requested_delta: 0.05,
                applied_delta: 0.0,
                clamped: true,
            }],
            clamped: true,
            snapshot: None,
        };
        let row = record.to_row().unwrap();
        assert_eq!(row.strategy_id, "alpha");
        assert!(row.clamped);
        let parsed: Vec<ParameterAdjustment> = serde_json::from_str(&row.deltas_json).unwrap();
        assert_eq!(parsed, record.adjustments);
    }
}
