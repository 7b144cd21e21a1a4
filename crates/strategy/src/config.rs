use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyManagerConfig {
    /// Patterns below this confidence never trigger adaptation
    pub confidence_threshold: f64,
    /// Scales every rule delta before pattern strength does
    pub learning_rate: f64,
    /// Minimum seconds between applied adaptations per strategy
    pub update_frequency_secs: i64,
    /// Parameters stay within this fraction of their base value
    pub max_drift_fraction: f64,
    /// Adaptation records retained, oldest evicted first
    pub history_limit: usize,
}

impl Default for StrategyManagerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            learning_rate: 0.1,
            update_frequency_secs: 3600, // one hour
            max_drift_fraction: 0.5,
            history_limit: 512,
        }
    }
}
