use std::time::Duration;

use proteus_analyzer::AnalyzerConfig;
use proteus_gate::GateConfig;
use proteus_patterns::DetectorConfig;
use proteus_risk_monitor::RiskMonitorConfig;
use proteus_strategy::StrategyManagerConfig;

/// Top-level engine configuration. Bundles the component configs and the
/// cadence of the background loops.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub strategies: StrategyManagerConfig,
    pub analyzer: AnalyzerConfig,
    pub risk: RiskMonitorConfig,
    pub gate: GateConfig,
    /// Samples retained per (asset, timeframe) series.
    pub window_capacity: usize,
    /// Cadence of the pattern detection sweep.
    pub detection_interval: Duration,
    /// Cadence of risk evaluation, snapshot persistence and reservation expiry.
    pub monitoring_interval: Duration,
    /// Cadence of the deferred-adaptation retry sweep.
    pub adaptation_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            strategies: StrategyManagerConfig::default(),
            analyzer: AnalyzerConfig::default(),
            risk: RiskMonitorConfig::default(),
            gate: GateConfig::default(),
            window_capacity: 256,
            detection_interval: Duration::from_secs(60),
            monitoring_interval: Duration::from_secs(10),
            adaptation_interval: Duration::from_secs(30),
        }
    }
}
