use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use proteus_core::{StrategyId, Timestamp};
use serde::{Deserialize, Serialize};

/// Rolling per-strategy performance snapshot.
///
/// Ratio metrics cover the evaluation window; total return, max drawdown
/// and trade count are all-time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPerformanceMetrics {
    pub strategy_id: StrategyId,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Sample volatility of per-trade returns in the window
    pub volatility: f64,
    /// Sharpe annualized by observed trade frequency
    pub sharpe_ratio: f64,
    /// Peak-to-trough fraction against the all-time equity peak
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: u64,
    /// Observations currently inside the evaluation window
    pub window_trades: usize,
    pub adaptation_impact: Option<AdaptationImpact>,
    pub computed_at: Timestamp,
}

/// Performance delta attributable to the most recent adaptations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptationImpact {
    /// Adaptation markers the delta spans
    pub adaptations: usize,
    pub return_delta: f64,
    pub sharpe_delta: f64,
}

/// Shared read handle over published snapshots.
///
/// The analyzer is the only writer; readers get cheap clones of immutable
/// snapshots. The version counter increments on every publish so pollers
/// can skip unchanged state.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<HashMap<StrategyId, MarketPerformanceMetrics>>>,
    version: Arc<AtomicU64>,
}

impl SnapshotHandle {
    pub fn get(&self, strategy_id: &str) -> Option<MarketPerformanceMetrics> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(strategy_id)
            .cloned()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub(crate) fn publish(&self, snapshot: MarketPerformanceMetrics) {
        {
            let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
            map.insert(snapshot.strategy_id.clone(), snapshot);
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}
