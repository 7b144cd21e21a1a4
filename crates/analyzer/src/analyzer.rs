use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use log::debug;
use proteus_core::{AssetId, Fill, Price, Quantity, Side, StrategyId, StrategyPosition, Timestamp};
use proteus_metrics::{
    SECONDS_PER_YEAR, annualized_return, profit_factor, sample_volatility, sharpe_ratio, win_rate,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::snapshot::{AdaptationImpact, MarketPerformanceMetrics, SnapshotHandle};

/// Result of routing one fill through the position book
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    pub realized_pnl: Decimal,
    /// Fractional return on the closed notional, when quantity closed
    pub realized_return: Option<f64>,
    /// Signed position quantity after the fill
    pub position_quantity: Decimal,
}

/// Snapshot state captured when an adaptation lands
struct AdaptationMark {
    total_return: f64,
    sharpe: f64,
}

struct StrategyPerf {
    positions: HashMap<AssetId, StrategyPosition>,
    /// (close timestamp, realized return fraction), bounded by the window
    returns: VecDeque<(Timestamp, f64)>,
    /// Cumulative product of (1 + r) over all closes, all-time
    equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    trade_count: u64,
    first_close_at: Option<Timestamp>,
    last_close_at: Option<Timestamp>,
    adaptation_marks: VecDeque<AdaptationMark>,
    snapshot: Option<MarketPerformanceMetrics>,
}

impl StrategyPerf {
    fn new() -> Self {
        Self {
            positions: HashMap::new(),
            returns: VecDeque::new(),
            equity: 1.0,
            peak_equity: 1.0,
            max_drawdown: 0.0,
            trade_count: 0,
            first_close_at: None,
            last_close_at: None,
            adaptation_marks: VecDeque::new(),
            snapshot: None,
        }
    }
}

/// Measures per-strategy performance from trade flow and publishes
/// immutable snapshots.
#[derive(Clone)]
pub struct PerformanceAnalyzer {
    config: AnalyzerConfig,
    strategies: Arc<DashMap<StrategyId, StrategyPerf>>,
    snapshots: SnapshotHandle,
}

impl PerformanceAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            strategies: Arc::new(DashMap::new()),
            snapshots: SnapshotHandle::default(),
        }
    }

    /// Create tracking state for a strategy. Idempotent.
    pub fn register_strategy(&self, strategy_id: impl Into<StrategyId>) {
        let strategy_id = strategy_id.into();
        self.strategies
            .entry(strategy_id.clone())
            .or_insert_with(StrategyPerf::new);
        debug!("[ANALYZER] Tracking strategy {strategy_id}");
    }

    pub fn is_registered(&self, strategy_id: &str) -> bool {
        self.strategies.contains_key(strategy_id)
    }

    /// Handle over published snapshots, shared with the adaptation engine
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    /// Record an opening trade without realized PnL
    pub fn record_open(
        &self,
        strategy_id: &str,
        asset: &str,
        side: Side,
        quantity: Quantity,
        price: Price,
        at: Timestamp,
    ) -> AnalyzerResult<()> {
        let mut entry = self
            .strategies
            .get_mut(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        entry
            .positions
            .entry(asset.to_string())
            .or_insert_with(|| StrategyPosition::new(asset))
            .apply_fill(side, quantity, price, at);
        Ok(())
    }

    /// Route a fill through the position book, deriving close events and
    /// realized PnL from the position change.
    pub fn apply_fill(&self, fill: &Fill) -> AnalyzerResult<FillOutcome> {
        let mut entry = self
            .strategies
            .get_mut(&fill.strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(fill.strategy_id.clone()))?;
        let perf = entry.value_mut();

        let position = perf
            .positions
            .entry(fill.asset.clone())
            .or_insert_with(|| StrategyPosition::new(fill.asset.clone()));
        let applied = position.apply_fill(fill.side, fill.quantity, fill.price, fill.timestamp);
        let position_quantity = position.quantity;

        let mut realized_return = None;
        if applied.closed_quantity > Decimal::ZERO {
            let basis = applied.entry_price * applied.closed_quantity;
            if basis > Decimal::ZERO {
                let fraction = (applied.realized_pnl / basis).to_f64().unwrap_or(0.0);
                realized_return = Some(fraction);
                Self::append_return(&self.config, perf, fraction, fill.timestamp);
                let snapshot =
                    Self::recompute(&self.config, perf, &fill.strategy_id, fill.timestamp);
                perf.snapshot = Some(snapshot.clone());
                self.snapshots.publish(snapshot);
                debug!(
                    "[ANALYZER] {} closed {} {} for {:.4}% realized",
                    fill.strategy_id,
                    applied.closed_quantity,
                    fill.asset,
                    fraction * 100.0
                );
            }
        }

        Ok(FillOutcome {
            realized_pnl: applied.realized_pnl,
            realized_return,
            position_quantity,
        })
    }

    /// Record a close directly as a realized return fraction
    pub fn record_close(
        &self,
        strategy_id: &str,
        realized_return: f64,
        at: Timestamp,
    ) -> AnalyzerResult<MarketPerformanceMetrics> {
        let mut entry = self
            .strategies
            .get_mut(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        let perf = entry.value_mut();

        Self::append_return(&self.config, perf, realized_return, at);
        let snapshot = Self::recompute(&self.config, perf, strategy_id, at);
        perf.snapshot = Some(snapshot.clone());
        self.snapshots.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Update the mark price used for unrealized PnL
    pub fn record_mark(
        &self,
        strategy_id: &str,
        asset: &str,
        price: Price,
        at: Timestamp,
    ) -> AnalyzerResult<()> {
        let mut entry = self
            .strategies
            .get_mut(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        if let Some(position) = entry.positions.get_mut(asset) {
            position.mark(price, at);
        }
        Ok(())
    }

    /// Latest snapshot for a strategy. Ratios need at least 2 closes.
    pub fn metrics(&self, strategy_id: &str) -> AnalyzerResult<MarketPerformanceMetrics> {
        let entry = self
            .strategies
            .get(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        let perf = entry.value();
        if perf.trade_count < 2 {
            return Err(AnalyzerError::NoData {
                strategy_id: strategy_id.to_string(),
                trades: perf.trade_count,
            });
        }
        perf.snapshot.clone().ok_or(AnalyzerError::NoData {
            strategy_id: strategy_id.to_string(),
            trades: perf.trade_count,
        })
    }

    /// Mark the current performance level so later snapshots can report
    /// the delta attributable to recent adaptations
    pub fn note_adaptation(&self, strategy_id: &str, _at: Timestamp) -> AnalyzerResult<()> {
        let mut entry = self
            .strategies
            .get_mut(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        let perf = entry.value_mut();

        let (total_return, sharpe) = perf
            .snapshot
            .as_ref()
            .map(|s| (s.total_return, s.sharpe_ratio))
            .unwrap_or((perf.equity - 1.0, 0.0));
        perf.adaptation_marks.push_back(AdaptationMark {
            total_return,
            sharpe,
        });
        while perf.adaptation_marks.len() > self.config.impact_window_adaptations.max(1) {
            perf.adaptation_marks.pop_front();
        }
        Ok(())
    }

    /// Current open positions for a strategy
    pub fn positions(&self, strategy_id: &str) -> AnalyzerResult<Vec<StrategyPosition>> {
        let entry = self
            .strategies
            .get(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        Ok(entry
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .cloned()
            .collect())
    }

    /// Sum of unrealized PnL across a strategy's marked positions
    pub fn unrealized_pnl(&self, strategy_id: &str) -> AnalyzerResult<Decimal> {
        let entry = self
            .strategies
            .get(strategy_id)
            .ok_or_else(|| AnalyzerError::UnknownStrategy(strategy_id.to_string()))?;
        Ok(entry
            .positions
            .values()
            .map(|p| p.unrealized_pnl())
            .sum())
    }

    fn append_return(config: &AnalyzerConfig, perf: &mut StrategyPerf, fraction: f64, at: Timestamp) {
        perf.returns.push_back((at, fraction));
        let cutoff = at - config.evaluation_window();
        while let Some((ts, _)) = perf.returns.front() {
            if *ts < cutoff {
                perf.returns.pop_front();
            } else {
                break;
            }
        }

        perf.trade_count += 1;
        perf.equity *= 1.0 + fraction;
        if perf.equity > perf.peak_equity {
            perf.peak_equity = perf.equity;
        } else if perf.peak_equity > 0.0 {
            let drawdown = (perf.peak_equity - perf.equity) / perf.peak_equity;
            if drawdown > perf.max_drawdown {
                perf.max_drawdown = drawdown;
            }
        }

        if perf.first_close_at.is_none() {
            perf.first_close_at = Some(at);
        }
        perf.last_close_at = Some(at);
    }

    fn recompute(
        config: &AnalyzerConfig,
        perf: &StrategyPerf,
        strategy_id: &str,
        now: Timestamp,
    ) -> MarketPerformanceMetrics {
        let series: Vec<f64> = perf.returns.iter().map(|(_, r)| *r).collect();

        let volatility = sample_volatility(&series).unwrap_or(0.0);
        let sharpe_core = sharpe_ratio(&series, config.risk_free_rate).unwrap_or(0.0);
        let window_span = match (perf.returns.front(), perf.returns.back()) {
            (Some((first, _)), Some((last, _))) => (*last - *first),
            _ => Duration::zero(),
        };
        // annualize by observed trade frequency
        let factor = if window_span > Duration::zero() && series.len() >= 2 {
            let years = window_span.num_seconds() as f64 / SECONDS_PER_YEAR;
            (series.len() as f64 / years).sqrt()
        } else {
            1.0
        };
        let sharpe = sharpe_core * factor;

        let total_return = perf.equity - 1.0;
        let elapsed_secs = match (perf.first_close_at, perf.last_close_at) {
            (Some(first), Some(last)) => (last - first).num_seconds() as f64,
            _ => 0.0,
        };

        let adaptation_impact = perf.adaptation_marks.front().map(|mark| AdaptationImpact {
            adaptations: perf.adaptation_marks.len(),
            return_delta: total_return - mark.total_return,
            sharpe_delta: sharpe - mark.sharpe,
        });

        MarketPerformanceMetrics {
            strategy_id: strategy_id.to_string(),
            total_return,
            annualized_return: annualized_return(total_return, elapsed_secs),
            volatility,
            sharpe_ratio: sharpe,
            max_drawdown: perf.max_drawdown,
            win_rate: win_rate(&series).unwrap_or(0.0),
            profit_factor: profit_factor(&series),
            trade_count: perf.trade_count,
            window_trades: series.len(),
            adaptation_impact,
            computed_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proteus_core::Fill;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ts(minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, minute, 0).unwrap()
    }

    fn analyzer() -> PerformanceAnalyzer {
        let analyzer = PerformanceAnalyzer::new(AnalyzerConfig::default());
        analyzer.register_strategy("momentum-1");
        analyzer
    }

    fn fill(side: Side, quantity: Decimal, price: Decimal, minute: u32) -> Fill {
        Fill {
            proposal_id: Uuid::new_v4(),
            strategy_id: "momentum-1".to_string(),
            asset: "BTC/USD".to_string(),
            side,
            quantity,
            price,
            timestamp: ts(minute),
        }
    }

    #[test]
    fn test_metrics_requires_two_closes() {
        let analyzer = analyzer();
        assert!(matches!(
            analyzer.metrics("momentum-1"),
            Err(AnalyzerError::NoData { trades: 0, .. })
        ));

        analyzer.record_close("momentum-1", 0.05, ts(0)).unwrap();
        assert!(matches!(
            analyzer.metrics("momentum-1"),
            Err(AnalyzerError::NoData { trades: 1, .. })
        ));

        analyzer.record_close("momentum-1", 0.02, ts(1)).unwrap();
        assert!(analyzer.metrics("momentum-1").is_ok());
    }

    #[test]
    fn test_unknown_strategy() {
        let analyzer = analyzer();
        assert_eq!(
            analyzer.metrics("ghost"),
            Err(AnalyzerError::UnknownStrategy("ghost".to_string()))
        );
    }

    #[test]
    fn test_total_return_compounds() {
        let analyzer = analyzer();
        analyzer.record_close("momentum-1", 0.10, ts(0)).unwrap();
        let snapshot = analyzer.record_close("momentum-1", -0.05, ts(1)).unwrap();

        assert!((snapshot.total_return - 0.045).abs() < 1e-9);
        assert_eq!(snapshot.trade_count, 2);
        assert!((snapshot.win_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_max_drawdown_is_monotone_and_peak_relative() {
        let analyzer = analyzer();
        let closes = [0.10, -0.20, 0.30, -0.10];
        let mut last_dd = 0.0;
        for (i, r) in closes.iter().enumerate() {
            let snapshot = analyzer
                .record_close("momentum-1", *r, ts(i as u32))
                .unwrap();
            assert!(snapshot.max_drawdown >= last_dd);
            last_dd = snapshot.max_drawdown;
        }
        // worst drop: 1.10 -> 0.88
        assert!((last_dd - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_survives_window_roll() {
        let config = AnalyzerConfig {
            evaluation_window_secs: 3600,
            ..AnalyzerConfig::default()
        };
        let analyzer = PerformanceAnalyzer::new(config);
        analyzer.register_strategy("momentum-1");

        analyzer.record_close("momentum-1", 0.10, ts(0)).unwrap();
        // two hours later: the first close has left the rolling window
        let later = ts(0) + Duration::hours(2);
        let snapshot = analyzer
            .record_close("momentum-1", -0.20, later)
            .unwrap();

        assert_eq!(snapshot.window_trades, 1);
        assert_eq!(snapshot.trade_count, 2);
        // all-time drawdown still sees the 1.10 peak
        assert!((snapshot.max_drawdown - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_apply_fill_attributes_realized_pnl() {
        let analyzer = analyzer();

        let opened = analyzer
            .apply_fill(&fill(Side::Buy, dec!(2), dec!(100), 0))
            .unwrap();
        assert_eq!(opened.realized_pnl, Decimal::ZERO);
        assert_eq!(opened.position_quantity, dec!(2));

        let closed = analyzer
            .apply_fill(&fill(Side::Sell, dec!(1), dec!(110), 1))
            .unwrap();
        assert_eq!(closed.realized_pnl, dec!(10));
        assert!((closed.realized_return.unwrap() - 0.10).abs() < 1e-9);

        let closed = analyzer
            .apply_fill(&fill(Side::Sell, dec!(1), dec!(90), 2))
            .unwrap();
        assert_eq!(closed.realized_pnl, dec!(-10));
        assert_eq!(closed.position_quantity, Decimal::ZERO);

        let snapshot = analyzer.metrics("momentum-1").unwrap();
        assert_eq!(snapshot.trade_count, 2);
        assert!((snapshot.win_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_adaptation_impact_spans_markers() {
        let analyzer = analyzer();
        analyzer.record_close("momentum-1", 0.05, ts(0)).unwrap();
        analyzer.record_close("momentum-1", 0.00, ts(1)).unwrap();
        analyzer.note_adaptation("momentum-1", ts(2)).unwrap();
        let snapshot = analyzer.record_close("momentum-1", 0.10, ts(3)).unwrap();

        let impact = snapshot.adaptation_impact.unwrap();
        assert_eq!(impact.adaptations, 1);
        // 1.05 * 1.10 - 1 against the 0.05 marked before adapting
        assert!((impact.return_delta - 0.105).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_handle_publishes() {
        let analyzer = analyzer();
        let handle = analyzer.snapshot_handle();
        assert!(handle.get("momentum-1").is_none());
        let v0 = handle.version();

        analyzer.record_close("momentum-1", 0.05, ts(0)).unwrap();
        let published = handle.get("momentum-1").unwrap();
        assert!((published.total_return - 0.05).abs() < 1e-9);
        assert!(handle.version() > v0);
    }

    #[test]
    fn test_positions_and_marks() {
        let analyzer = analyzer();
        analyzer
            .apply_fill(&fill(Side::Buy, dec!(2), dec!(100), 0))
            .unwrap();
        analyzer
            .record_mark("momentum-1", "BTC/USD", dec!(110), ts(1))
            .unwrap();

        assert_eq!(analyzer.unrealized_pnl("momentum-1").unwrap(), dec!(20));
        let positions = analyzer.positions("momentum-1").unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(2));
    }

    #[test]
    fn test_record_open_books_position_without_trades() {
        let analyzer = analyzer();
        analyzer
            .record_open("momentum-1", "BTC/USD", Side::Buy, dec!(2), dec!(100), ts(0))
            .unwrap();

        let positions = analyzer.positions("momentum-1").unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(2));
        // an open is not a closed trade
        assert!(matches!(
            analyzer.metrics("momentum-1"),
            Err(AnalyzerError::NoData { trades: 0, .. })
        ));
    }
}
