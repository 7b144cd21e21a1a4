//! Engine - full adaptive-strategy system orchestration
//!
//! Ties together all components:
//! - Market data ingestion into per-series sample windows
//! - Pattern detection and strategy adaptation on a timer
//! - Fill attribution across gate, analyzer and risk monitor
//! - Risk evaluation, snapshot persistence and reservation expiry
//! - Alert persistence

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use proteus_analyzer::{AnalyzerResult, MarketPerformanceMetrics, PerformanceAnalyzer};
use proteus_core::{AssetId, OrderProposal, SampleWindow, StrategyId, Timeframe};
use proteus_gate::{Decision, OrderGate};
use proteus_patterns::{DetectError, DetectResult, DetectedPattern, PatternDetector};
use proteus_ports::{
    AdaptationRow, Clock, FillFeed, MarketDataFeed, PerformanceSnapshotRow, StateStore,
    StoreResult,
};
use proteus_risk_monitor::{HaltInfo, RiskAlert, RiskMonitor};
use proteus_strategy::{AdaptationReport, StrategyConfig, StrategyManager, StrategyResult};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::store::InMemoryStore;

/// One ingested market data series
type SeriesKey = (AssetId, Timeframe);

/// Point-in-time view of the engine's operational state
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub accepting_orders: bool,
    pub emergency_stopped: bool,
    /// Reason and time of the emergency stop, when one is active
    pub emergency: Option<HaltInfo>,
    /// Individually halted strategies with reason and time
    pub halted: Vec<(StrategyId, HaltInfo)>,
    pub strategies: usize,
    pub open_reservations: usize,
    pub tracked_series: usize,
}

/// The orchestration context. Owns every component; all cross-component
/// wiring happens here and nowhere else.
///
/// Lifecycle: construct, [`start`](Engine::start) with the two feeds, then
/// [`shutdown`](Engine::shutdown). Operations stay callable whether or not
/// the background loops are running.
pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    detector: Arc<PatternDetector>,
    strategies: StrategyManager,
    analyzer: PerformanceAnalyzer,
    risk: RiskMonitor,
    gate: OrderGate,
    store: Arc<dyn StateStore>,
    windows: Arc<DashMap<SeriesKey, SampleWindow>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, store: Arc<dyn StateStore>) -> Self {
        let detector = Arc::new(PatternDetector::new(config.detector.clone()));
        let analyzer = PerformanceAnalyzer::new(config.analyzer.clone());
        let strategies = StrategyManager::new(
            config.strategies.clone(),
            clock.clone(),
            analyzer.snapshot_handle(),
        );
        let risk = RiskMonitor::new(config.risk.clone(), clock.clone());
        let gate = OrderGate::new(
            config.gate.clone(),
            clock.clone(),
            strategies.clone(),
            risk.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            clock,
            detector,
            strategies,
            analyzer,
            risk,
            gate,
            store,
            windows: Arc::new(DashMap::new()),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// System clock and in-memory persistence; what demos and most tests use
    pub fn with_defaults() -> Self {
        Self::new(
            EngineConfig::default(),
            Arc::new(proteus_clock::SystemClock::new()),
            Arc::new(InMemoryStore::new()),
        )
    }

    /// Spawn the background loops over the given feeds.
    ///
    /// A second call while running is ignored.
    pub fn start<M, F>(&self, market: M, fills: F)
    where
        M: MarketDataFeed + 'static,
        F: FillFeed + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("[ENGINE] Already running, start ignored");
            return;
        }
        log::info!("[ENGINE] Starting background loops");

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(tokio::spawn(Self::run_market_ingest(
            market,
            self.windows.clone(),
            self.risk.clone(),
            self.config.window_capacity,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Self::run_fill_ingest(
            fills,
            self.gate.clone(),
            self.analyzer.clone(),
            self.risk.clone(),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Self::run_detection(
            self.detector.clone(),
            self.windows.clone(),
            self.strategies.clone(),
            self.analyzer.clone(),
            self.store.clone(),
            self.config.detection_interval,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Self::run_monitoring(
            self.risk.clone(),
            self.gate.clone(),
            self.strategies.clone(),
            self.analyzer.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.config.monitoring_interval,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Self::run_pending_adaptations(
            self.strategies.clone(),
            self.analyzer.clone(),
            self.store.clone(),
            self.config.adaptation_interval,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Self::run_alert_sink(
            self.risk.subscribe_alerts(),
            self.store.clone(),
            self.shutdown_tx.subscribe(),
        )));
    }

    /// Stop the engine: close the gate, signal the loops, wait for them.
    ///
    /// The gate closes before anything else so no proposal is approved
    /// while the loops drain. In-flight validations finish normally.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("[ENGINE] Shutting down");
        self.gate.stop_accepting();
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("[ENGINE] Background task ended abnormally: {e}");
            }
        }
        log::info!("[ENGINE] Stopped");
    }

    /// Register a strategy with the manager, analyzer and risk monitor,
    /// then persist its row.
    pub async fn register_strategy(&self, config: StrategyConfig) -> StrategyResult<()> {
        let strategy_id = config.strategy_id.clone();
        self.strategies.register(config)?;
        self.analyzer.register_strategy(strategy_id.as_str());
        self.risk.register_strategy(&strategy_id);

        if let Some(strategy) = self.strategies.get(&strategy_id) {
            match strategy.to_row() {
                Ok(row) => {
                    if let Err(e) = self.store.save_strategy(row).await {
                        log::warn!("[ENGINE] Failed to persist strategy {strategy_id}: {e}");
                    }
                }
                Err(e) => log::warn!("[ENGINE] Failed to encode strategy {strategy_id}: {e}"),
            }
        }
        Ok(())
    }

    /// Detect patterns over the accumulated window for one series
    pub fn detect_patterns(
        &self,
        asset: &str,
        timeframe: Timeframe,
    ) -> DetectResult<Vec<DetectedPattern>> {
        let key = (asset.to_string(), timeframe);
        let Some(window) = self.windows.get(&key) else {
            return Err(DetectError::InsufficientData {
                required: self.config.detector.min_window_len,
                actual: 0,
            });
        };
        self.detector.detect_all(window.value())
    }

    /// Run one adaptation round and persist the applied records
    pub async fn adapt_strategies(&self, patterns: &[DetectedPattern]) -> AdaptationReport {
        let report = self.strategies.adapt(patterns);
        Self::record_report(&self.analyzer, &*self.store, &report).await;
        report
    }

    /// Performance metrics for a strategy, when enough trades exist
    pub fn performance_metrics(&self, strategy_id: &str) -> AnalyzerResult<MarketPerformanceMetrics> {
        self.analyzer.metrics(strategy_id)
    }

    /// Persisted adaptation history for a strategy, newest first
    pub async fn adaptation_history(
        &self,
        strategy_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<AdaptationRow>> {
        self.store.adaptations(strategy_id, limit).await
    }

    /// Validate an order proposal through the gate
    pub fn validate_order(&self, proposal: &OrderProposal) -> Decision {
        self.gate.validate(&proposal.strategy_id, proposal)
    }

    /// Reject every strategy's proposals until `resume_all`
    pub fn emergency_stop(&self, reason: impl Into<String>) {
        self.risk.emergency_stop(reason);
    }

    /// Halt one strategy; its proposals reject until resumed
    pub fn halt_strategy(&self, strategy_id: &str, reason: impl Into<String>) {
        self.risk.halt_strategy(strategy_id, reason);
    }

    /// Returns false when the strategy was not halted
    pub fn resume_strategy(&self, strategy_id: &str) -> bool {
        self.risk.resume_strategy(strategy_id)
    }

    /// Lift the emergency stop and every per-strategy halt
    pub fn resume_all(&self) {
        self.risk.resume_all();
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<RiskAlert> {
        self.risk.subscribe_alerts()
    }

    pub fn status(&self) -> EngineStatus {
        let registry = self.risk.halt_registry();
        EngineStatus {
            running: self.running.load(Ordering::SeqCst),
            accepting_orders: self.gate.is_accepting(),
            emergency_stopped: registry.is_emergency_stopped(),
            emergency: registry.emergency_info(),
            halted: registry.halted(),
            strategies: self.strategies.len(),
            open_reservations: self.gate.open_reservations(),
            tracked_series: self.windows.len(),
        }
    }

    /// Copy of the accumulated window for one series
    pub fn window(&self, asset: &str, timeframe: Timeframe) -> Option<SampleWindow> {
        self.windows
            .get(&(asset.to_string(), timeframe))
            .map(|entry| entry.value().clone())
    }

    pub fn strategies(&self) -> &StrategyManager {
        &self.strategies
    }

    pub fn analyzer(&self) -> &PerformanceAnalyzer {
        &self.analyzer
    }

    pub fn risk(&self) -> &RiskMonitor {
        &self.risk
    }

    pub fn gate(&self) -> &OrderGate {
        &self.gate
    }

    /// Window accumulation and price marks. Samples with stale timestamps
    /// are dropped here, which is what makes at-least-once delivery safe.
    async fn run_market_ingest<M: MarketDataFeed + 'static>(
        mut feed: M,
        windows: Arc<DashMap<SeriesKey, SampleWindow>>,
        risk: RiskMonitor,
        capacity: usize,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Market ingest started ({})", feed.name());
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = feed.next_event() => {
                    let Some(event) = event else { break };
                    risk.on_mark(&event.asset, event.sample.price);
                    let key = (event.asset.clone(), event.timeframe);
                    let mut window = windows.entry(key).or_insert_with(|| {
                        SampleWindow::new(event.asset.clone(), event.timeframe, capacity)
                    });
                    if !window.push(event.sample) {
                        log::debug!(
                            "[ENGINE] Dropped stale sample for {} {}",
                            event.asset,
                            event.timeframe.as_str()
                        );
                    }
                }
            }
        }
        log::info!("[ENGINE] Market ingest stopped");
    }

    /// Fill attribution: settle the gate reservation, book the trade with
    /// the analyzer, feed realized return into the risk monitor.
    async fn run_fill_ingest<F: FillFeed + 'static>(
        mut fills: F,
        gate: OrderGate,
        analyzer: PerformanceAnalyzer,
        risk: RiskMonitor,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Fill ingest started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                fill = fills.next_fill() => {
                    let Some(fill) = fill else { break };
                    gate.settle_fill(&fill);
                    match analyzer.apply_fill(&fill) {
                        Ok(outcome) => {
                            if let Err(e) = risk.on_fill(&fill, outcome.realized_return) {
                                log::warn!(
                                    "[ENGINE] Risk book rejected fill for {}: {}",
                                    fill.strategy_id, e
                                );
                            }
                        }
                        Err(e) => {
                            log::warn!("[ENGINE] Dropped fill for {}: {}", fill.strategy_id, e);
                        }
                    }
                }
            }
        }
        log::info!("[ENGINE] Fill ingest stopped");
    }

    /// Periodic detection sweep over every accumulated series, feeding
    /// whatever it finds into one adaptation round.
    async fn run_detection(
        detector: Arc<PatternDetector>,
        windows: Arc<DashMap<SeriesKey, SampleWindow>>,
        strategies: StrategyManager,
        analyzer: PerformanceAnalyzer,
        store: Arc<dyn StateStore>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Detection loop started ({interval:?} interval)");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let mut patterns: Vec<DetectedPattern> = Vec::new();
                    for entry in windows.iter() {
                        match detector.detect_all(entry.value()) {
                            Ok(mut found) => patterns.append(&mut found),
                            // short windows fill up over time, not an error
                            Err(DetectError::InsufficientData { .. }) => {}
                        }
                    }
                    if patterns.is_empty() {
                        continue;
                    }
                    log::debug!("[ENGINE] Detection sweep found {} pattern(s)", patterns.len());
                    let report = strategies.adapt(&patterns);
                    Self::record_report(&analyzer, &*store, &report).await;
                }
            }
        }
        log::info!("[ENGINE] Detection loop stopped");
    }

    /// Risk evaluation, reservation expiry and snapshot persistence
    #[allow(clippy::too_many_arguments)]
    async fn run_monitoring(
        risk: RiskMonitor,
        gate: OrderGate,
        strategies: StrategyManager,
        analyzer: PerformanceAnalyzer,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Monitoring loop started ({interval:?} interval)");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    risk.evaluate();
                    gate.release_expired();

                    let now = clock.now();
                    for strategy_id in strategies.strategy_ids() {
                        match analyzer.metrics(&strategy_id) {
                            Ok(metrics) => {
                                let row = PerformanceSnapshotRow {
                                    strategy_id: strategy_id.clone(),
                                    timestamp: now,
                                    total_return: metrics.total_return,
                                    sharpe_ratio: metrics.sharpe_ratio,
                                    max_drawdown: metrics.max_drawdown,
                                    win_rate: metrics.win_rate,
                                    trade_count: metrics.trade_count,
                                };
                                if let Err(e) = store.append_snapshot(row).await {
                                    log::warn!(
                                        "[ENGINE] Failed to persist snapshot for {strategy_id}: {e}"
                                    );
                                }
                            }
                            // fewer than two closed trades, nothing to snapshot yet
                            Err(e) => log::debug!("[ENGINE] No snapshot for {strategy_id}: {e}"),
                        }
                    }
                }
            }
        }
        log::info!("[ENGINE] Monitoring loop stopped");
    }

    /// Retry sweep for rate-limited adaptations whose signal was deferred
    async fn run_pending_adaptations(
        strategies: StrategyManager,
        analyzer: PerformanceAnalyzer,
        store: Arc<dyn StateStore>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Adaptation loop started ({interval:?} interval)");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let report = strategies.process_pending();
                    Self::record_report(&analyzer, &*store, &report).await;
                }
            }
        }
        log::info!("[ENGINE] Adaptation loop stopped");
    }

    /// Persist every risk alert as a violation row
    async fn run_alert_sink(
        mut alerts: broadcast::Receiver<RiskAlert>,
        store: Arc<dyn StateStore>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("[ENGINE] Alert sink started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                alert = alerts.recv() => match alert {
                    Ok(alert) => {
                        if let Err(e) = store.append_violation(alert.to_row()).await {
                            log::warn!("[ENGINE] Failed to persist violation: {e}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("[ENGINE] Alert sink lagged, {n} alert(s) dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        log::info!("[ENGINE] Alert sink stopped");
    }

    /// Marks applied adaptations with the analyzer and persists their rows.
    /// Store failures are logged and do not fail the adaptation.
    async fn record_report(
        analyzer: &PerformanceAnalyzer,
        store: &dyn StateStore,
        report: &AdaptationReport,
    ) {
        for record in &report.applied {
            if let Err(e) = analyzer.note_adaptation(&record.strategy_id, record.timestamp) {
                log::debug!(
                    "[ENGINE] Analyzer skipped adaptation marker for {}: {}",
                    record.strategy_id, e
                );
            }
            match record.to_row() {
                Ok(row) => {
                    if let Err(e) = store.append_adaptation(row).await {
                        log::warn!(
                            "[ENGINE] Failed to persist adaptation for {}: {}",
                            record.strategy_id, e
                        );
                    }
                }
                Err(e) => log::warn!(
                    "[ENGINE] Failed to encode adaptation for {}: {}",
                    record.strategy_id, e
                ),
            }
        }
    }
}
