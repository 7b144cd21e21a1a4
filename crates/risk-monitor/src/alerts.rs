use proteus_core::{AssetId, Timestamp};
use proteus_ports::RiskViolationRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::RiskScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    ValueAtRisk,
    Drawdown,
    DailyLoss,
    Correlation,
    Concentration,
    Exposure,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ValueAtRisk => "value_at_risk",
            AlertKind::Drawdown => "drawdown",
            AlertKind::DailyLoss => "daily_loss",
            AlertKind::Correlation => "correlation",
            AlertKind::Concentration => "concentration",
            AlertKind::Exposure => "exposure",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// One limit breach notification. Emitted once per breach episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub scope: RiskScope,
    /// Asset qualifier for per-asset concentration breaches
    pub asset: Option<AssetId>,
    pub breach_value: f64,
    pub limit_value: f64,
    pub message: String,
    pub timestamp: Timestamp,
}

impl RiskAlert {
    /// Persistence row for this alert.
    pub fn to_row(&self) -> RiskViolationRow {
        RiskViolationRow {
            timestamp: self.timestamp,
            scope: self.scope.key().to_string(),
            kind: self.kind.as_str().to_string(),
            severity: self.severity.as_str().to_string(),
            breach_value: self.breach_value,
            limit_value: self.limit_value,
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_alert_to_violation_row() {
        let alert = RiskAlert {
            id: Uuid::new_v4(),
            kind: AlertKind::Drawdown,
            severity: AlertSeverity::Critical,
            scope: RiskScope::Strategy("alpha".to_string()),
            asset: None,
            breach_value: 0.25,
            limit_value: 0.20,
            message: "alpha drawdown at 0.2500 against limit 0.2000".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        };
        let row = alert.to_row();
        assert_eq!(row.scope, "alpha");
        assert_eq!(row.kind, "drawdown");
        assert_eq!(row.severity, "critical");
        assert_eq!(row.breach_value, 0.25);
        assert_eq!(row.limit_value, 0.20);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Warning < AlertSeverity::Critical);
    }
}

