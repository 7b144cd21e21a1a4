use std::collections::BTreeMap;

use proteus_core::{AssetId, StrategyId, Timeframe, Timestamp};
use proteus_patterns::DetectedPattern;
use proteus_ports::{StoreError, StoreResult, StrategyRow};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::rules::AdaptationRule;

/// Parameter names the risk limits bound directly.
pub mod params {
    pub const MAX_POSITION_SIZE: &str = "max_position_size";
    pub const LEVERAGE: &str = "leverage";
    pub const STOP_LOSS: &str = "stop_loss";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    TrendFollowing,
    MeanReversion,
    Momentum,
    Arbitrage,
    MarketMaking,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Arbitrage => "arbitrage",
            StrategyKind::MarketMaking => "market_making",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTargets {
    pub target_return: f64,
    pub max_drawdown: f64,
    pub min_sharpe: f64,
    pub min_win_rate: f64,
}

impl Default for PerformanceTargets {
    fn default() -> Self {
        Self {
            target_return: 0.10,  // 10% over the evaluation horizon
            max_drawdown: 0.15,
            min_sharpe: 1.0,
            min_win_rate: 0.5,
        }
    }
}

/// Hard per-strategy risk bounds. `current_parameters` never violate
/// these; adjustments that would are clamped to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_size: Decimal,
    pub max_leverage: Decimal,
    pub stop_loss_fraction: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: dec!(1),
            max_leverage: dec!(3),
            stop_loss_fraction: dec!(0.05),
        }
    }
}

impl RiskLimits {
    /// Upper bound this limit set places on a named parameter, if any.
    pub fn bound_for(&self, parameter: &str) -> Option<f64> {
        let cap = match parameter {
            params::MAX_POSITION_SIZE => self.max_position_size,
            params::LEVERAGE => self.max_leverage,
            params::STOP_LOSS => self.stop_loss_fraction,
            _ => return None,
        };
        Some(cap.to_f64().unwrap_or(f64::MAX).max(0.0))
    }

    /// Clamps a parameter value into [0, bound] when the name is bounded.
    pub fn clamp(&self, parameter: &str, value: f64) -> f64 {
        match self.bound_for(parameter) {
            Some(cap) => value.clamp(0.0, cap),
            None => value,
        }
    }
}

/// Registration input for one adaptive strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_id: StrategyId,
    pub kind: StrategyKind,
    /// Mandate: only patterns on this asset and timeframe adapt it
    pub asset: AssetId,
    pub timeframe: Timeframe,
    pub parameters: BTreeMap<String, f64>,
    pub performance_targets: PerformanceTargets,
    pub risk_limits: RiskLimits,
    /// Evaluated in order on every matching pattern
    pub rules: Vec<AdaptationRule>,
}

/// A registered strategy in the arena.
///
/// `base_parameters` are immutable after registration;
/// `current_parameters` move only through the adaptation engine while the
/// arena entry is held, and always satisfy `risk_limits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveStrategy {
    pub strategy_id: StrategyId,
    pub kind: StrategyKind,
    pub asset: AssetId,
    pub timeframe: Timeframe,
    pub base_parameters: BTreeMap<String, f64>,
    pub current_parameters: BTreeMap<String, f64>,
    pub performance_targets: PerformanceTargets,
    pub risk_limits: RiskLimits,
    pub rules: Vec<AdaptationRule>,
    pub registered_at: Timestamp,
    pub last_adapted_at: Option<Timestamp>,
}

impl AdaptiveStrategy {
    pub fn from_config(config: StrategyConfig, registered_at: Timestamp) -> Self {
        // the limit invariant holds from the first moment
        let mut current = config.parameters.clone();
        for (name, value) in current.iter_mut() {
            *value = config.risk_limits.clamp(name, *value);
        }
        Self {
            strategy_id: config.strategy_id,
            kind: config.kind,
            asset: config.asset,
            timeframe: config.timeframe,
            base_parameters: config.parameters,
            current_parameters: current,
            performance_targets: config.performance_targets,
            risk_limits: config.risk_limits,
            rules: config.rules,
            registered_at,
            last_adapted_at: None,
        }
    }

    /// Whether a pattern falls inside this strategy's mandate.
    pub fn matches(&self, pattern: &DetectedPattern) -> bool {
        self.asset == pattern.asset && self.timeframe == pattern.timeframe
    }

    /// Effective position-size cap: the risk limit, tightened by the live
    /// `max_position_size` parameter when one is present.
    pub fn live_max_position_size(&self) -> Decimal {
        let limit = self.risk_limits.max_position_size;
        match self.current_parameters.get(params::MAX_POSITION_SIZE) {
            Some(value) => Decimal::from_f64(*value).map_or(limit, |d| d.min(limit)),
            None => limit,
        }
    }

    /// Persistence row capturing the full registered state.
    pub fn to_row(&self) -> StoreResult<StrategyRow> {
        Ok(StrategyRow {
            strategy_id: self.strategy_id.clone(),
            kind: self.kind.as_str().to_string(),
            asset: self.asset.clone(),
            timeframe: self.timeframe.as_str().to_string(),
            registered_at: self.registered_at,
            config_json: serde_json::to_string(self)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config() -> StrategyConfig {
        StrategyConfig {
            strategy_id: "alpha".to_string(),
            kind: StrategyKind::TrendFollowing,
            asset: "BTC/USD".to_string(),
            timeframe: Timeframe::H1,
            parameters: BTreeMap::from([
                ("entry_threshold".to_string(), 1.5),
                (params::MAX_POSITION_SIZE.to_string(), 0.1),
            ]),
            performance_targets: PerformanceTargets::default(),
            risk_limits: RiskLimits {
                max_position_size: dec!(0.1),
                ..RiskLimits::default()
            },
            rules: Vec::new(),
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_registration_clamps_into_risk_limits() {
        let mut config = config();
        config
            .parameters
            .insert(params::MAX_POSITION_SIZE.to_string(), 0.5);
        let strategy = AdaptiveStrategy::from_config(config, t0());
        assert_eq!(
            strategy.current_parameters[params::MAX_POSITION_SIZE],
            0.1
        );
        // base keeps the registered value untouched
        assert_eq!(strategy.base_parameters[params::MAX_POSITION_SIZE], 0.5);
    }

    #[test]
    fn test_live_max_position_size_tightens_limit() {
        let strategy = AdaptiveStrategy::from_config(config(), t0());
        assert_eq!(strategy.live_max_position_size(), dec!(0.1));

        let mut without_param = config();
        without_param.parameters.remove(params::MAX_POSITION_SIZE);
        let strategy = AdaptiveStrategy::from_config(without_param, t0());
        // falls back to the risk limit itself
        assert_eq!(strategy.live_max_position_size(), dec!(0.1));
    }

    #[test]
    fn test_unbounded_parameter_passes_through() {
        let limits = RiskLimits::default();
        assert_eq!(limits.clamp("entry_threshold", 42.0), 42.0);
        assert_eq!(limits.bound_for("entry_threshold"), None);
    }

    #[test]
    fn test_to_row_round_trips_config_json() {
        let strategy = AdaptiveStrategy::from_config(config(), t0());
        let row = strategy.to_row().unwrap();
        assert_eq!(row.strategy_id, "alpha");
        assert_eq!(row.kind, "trend_following");
        assert_eq!(row.timeframe, "1h");
        let parsed: AdaptiveStrategy = serde_json::from_str(&row.config_json).unwrap();
        assert_eq!(parsed.current_parameters, strategy.current_parameters);
    }
}
