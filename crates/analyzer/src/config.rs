use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Rolling window for ratio metrics, in seconds
    pub evaluation_window_secs: i64,
    /// Per-period risk-free rate subtracted in the Sharpe ratio
    pub risk_free_rate: f64,
    /// Number of recent adaptations the impact measure spans
    pub impact_window_adaptations: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            evaluation_window_secs: 86_400, // 24 hours
            risk_free_rate: 0.0,
            impact_window_adaptations: 5,
        }
    }
}

impl AnalyzerConfig {
    pub fn evaluation_window(&self) -> Duration {
        Duration::seconds(self.evaluation_window_secs)
    }
}
