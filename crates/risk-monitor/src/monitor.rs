use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use dashmap::DashMap;
use log::{debug, error, warn};
use proteus_core::{AssetId, Fill, Price, StrategyId, StrategyPosition, Timestamp};
use proteus_metrics::{expected_shortfall, pearson_correlation, value_at_risk};
use proteus_ports::Clock;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::alerts::{AlertKind, AlertSeverity, RiskAlert};
use crate::config::{RiskLimitConfig, RiskMonitorConfig};
use crate::error::{RiskError, RiskResult};
use crate::halt::HaltRegistry;
use crate::state::{RiskScope, RiskState};

/// Breach episode phases. Warned and Breached only close once the value
/// falls back below the warning boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Episode {
    Clear,
    Warned,
    Breached,
}

type EpisodeKey = (AlertKind, String);

#[derive(Debug)]
struct StrategyBook {
    positions: HashMap<AssetId, StrategyPosition>,
    /// Realized per-trade returns, newest at the back
    returns: VecDeque<f64>,
    realized_pnl: Decimal,
    daily_pnl: Decimal,
    /// Peak of capital + realized PnL
    peak_equity: Decimal,
    /// Peak of capital + realized + unrealized PnL
    peak_marked: Decimal,
}

#[derive(Debug)]
struct PortfolioBook {
    returns: VecDeque<f64>,
    peak_equity: Decimal,
    peak_marked: Decimal,
}

/// Portfolio and per-strategy risk tracker.
///
/// Fills update position books and PnL immediately; `evaluate` recomputes
/// the derived measurements (VaR, drawdowns, correlations, exposures),
/// compares them against the configured limits, and emits one alert per
/// breach episode. Cheap to clone, all state is shared.
#[derive(Clone)]
pub struct RiskMonitor {
    config: RiskMonitorConfig,
    clock: Arc<dyn Clock>,
    books: Arc<DashMap<StrategyId, StrategyBook>>,
    marks: Arc<DashMap<AssetId, Price>>,
    episodes: Arc<DashMap<EpisodeKey, Episode>>,
    /// Pairwise return correlations from the last evaluation, keyed by
    /// the lexicographically ordered strategy pair
    correlations: Arc<DashMap<(StrategyId, StrategyId), f64>>,
    states: Arc<DashMap<String, RiskState>>,
    portfolio: Arc<RwLock<PortfolioBook>>,
    halts: Arc<HaltRegistry>,
    day: Arc<RwLock<NaiveDate>>,
    alert_tx: broadcast::Sender<RiskAlert>,
}

impl RiskMonitor {
    pub fn new(config: RiskMonitorConfig, clock: Arc<dyn Clock>) -> Self {
        let (alert_tx, _) = broadcast::channel(config.alert_buffer.max(1));
        let day = clock.now().date_naive();
        let capital = config.initial_capital;
        Self {
            config,
            clock,
            books: Arc::new(DashMap::new()),
            marks: Arc::new(DashMap::new()),
            episodes: Arc::new(DashMap::new()),
            correlations: Arc::new(DashMap::new()),
            states: Arc::new(DashMap::new()),
            portfolio: Arc::new(RwLock::new(PortfolioBook {
                returns: VecDeque::new(),
                peak_equity: capital,
                peak_marked: capital,
            })),
            halts: Arc::new(HaltRegistry::new()),
            day: Arc::new(RwLock::new(day)),
            alert_tx,
        }
    }

    pub fn register_strategy(&self, strategy_id: &str) {
        let capital = self.config.initial_capital;
        self.books
            .entry(strategy_id.to_string())
            .or_insert_with(|| StrategyBook {
                positions: HashMap::new(),
                returns: VecDeque::new(),
                realized_pnl: Decimal::ZERO,
                daily_pnl: Decimal::ZERO,
                peak_equity: capital,
                peak_marked: capital,
            });
        debug!("[RISK] Tracking strategy {strategy_id}");
    }

    pub fn is_tracking(&self, strategy_id: &str) -> bool {
        self.books.contains_key(strategy_id)
    }

    /// Applies a fill to the owning strategy's position book.
    ///
    /// `realized_return` is the per-trade return the caller attributes to
    /// any closed quantity; it feeds the VaR and correlation series.
    pub fn on_fill(&self, fill: &Fill, realized_return: Option<f64>) -> RiskResult<()> {
        self.maybe_roll_day();
        let mut book = self
            .books
            .get_mut(&fill.strategy_id)
            .ok_or_else(|| RiskError::UnknownStrategy(fill.strategy_id.clone()))?;
        let position = book
            .positions
            .entry(fill.asset.clone())
            .or_insert_with(|| StrategyPosition::new(fill.asset.clone()));
        let applied = position.apply_fill(fill.side, fill.quantity, fill.price, fill.timestamp);
        book.realized_pnl += applied.realized_pnl;
        book.daily_pnl += applied.realized_pnl;
        let equity = self.config.initial_capital + book.realized_pnl;
        if equity > book.peak_equity {
            book.peak_equity = equity;
        }
        if let Some(r) = realized_return {
            book.returns.push_back(r);
            while book.returns.len() > self.config.return_history {
                book.returns.pop_front();
            }
        }
        drop(book);

        self.marks.insert(fill.asset.clone(), fill.price);
        if let Some(r) = realized_return {
            let mut portfolio = self.portfolio.write().unwrap_or_else(|e| e.into_inner());
            portfolio.returns.push_back(r);
            while portfolio.returns.len() > self.config.return_history {
                portfolio.returns.pop_front();
            }
        }
        Ok(())
    }

    /// Updates the reference mark for an asset.
    pub fn on_mark(&self, asset: &str, price: Price) {
        self.marks.insert(asset.to_string(), price);
    }

    /// Recomputes every risk state, raises alerts for limit transitions,
    /// and returns the refreshed states with the portfolio first.
    pub fn evaluate(&self) -> Vec<RiskState> {
        self.maybe_roll_day();
        let now = self.clock.now();
        let limits = self.config.limits.clone();
        let warning = self.config.warning_fraction;
        let min_samples = self.config.var_min_samples;
        let daily_limit = limits.max_daily_loss.to_f64().unwrap_or(f64::MAX);

        let mut measured: Vec<Measured> = Vec::new();
        let mut asset_gross: HashMap<AssetId, Decimal> = HashMap::new();
        for mut entry in self.books.iter_mut() {
            let id = entry.key().clone();
            let book = entry.value_mut();
            let mut gross = Decimal::ZERO;
            let mut unrealized = Decimal::ZERO;
            for (asset, position) in &book.positions {
                let mark = self.mark_for(asset, position);
                let notional = position.notional(mark);
                gross += notional;
                unrealized += position.unrealized_at(mark);
                *asset_gross.entry(asset.clone()).or_insert(Decimal::ZERO) += notional;
            }
            let equity = self.config.initial_capital + book.realized_pnl;
            let marked = equity + unrealized;
            if equity > book.peak_equity {
                book.peak_equity = equity;
            }
            if marked > book.peak_marked {
                book.peak_marked = marked;
            }
            measured.push(Measured {
                id,
                gross,
                unrealized,
                realized: book.realized_pnl,
                daily: book.daily_pnl,
                returns: book.returns.iter().copied().collect(),
                realized_dd: drawdown_fraction(book.peak_equity, equity),
                marked_dd: drawdown_fraction(book.peak_marked, marked),
            });
        }
        measured.sort_by(|a, b| a.id.cmp(&b.id));

        // Pairwise correlations over the overlapping return tails
        self.correlations.clear();
        let mut max_abs: HashMap<StrategyId, f64> = HashMap::new();
        for i in 0..measured.len() {
            for j in (i + 1)..measured.len() {
                let a = &measured[i];
                let b = &measured[j];
                let n = a.returns.len().min(b.returns.len());
                if n < min_samples {
                    continue;
                }
                let corr = pearson_correlation(
                    &a.returns[a.returns.len() - n..],
                    &b.returns[b.returns.len() - n..],
                )
                .unwrap_or(0.0);
                self.correlations
                    .insert(ordered_pair(&a.id, &b.id), corr);
                let abs = corr.abs();
                let entry_a = max_abs.entry(a.id.clone()).or_insert(0.0);
                if abs > *entry_a {
                    *entry_a = abs;
                }
                let entry_b = max_abs.entry(b.id.clone()).or_insert(0.0);
                if abs > *entry_b {
                    *entry_b = abs;
                }
            }
        }

        let portfolio_gross: Decimal = measured.iter().map(|m| m.gross).sum();
        let total_unrealized: Decimal = measured.iter().map(|m| m.unrealized).sum();
        let total_realized: Decimal = measured.iter().map(|m| m.realized).sum();
        let total_daily: Decimal = measured.iter().map(|m| m.daily).sum();
        let portfolio_equity = self.config.initial_capital + total_realized;

        let mut states = Vec::with_capacity(measured.len() + 1);
        for m in &measured {
            let scope = RiskScope::Strategy(m.id.clone());
            let var_95 = var_or_zero(&m.returns, 0.95, min_samples);
            let var_99 = var_or_zero(&m.returns, 0.99, min_samples);
            let es_95 = shortfall_or_zero(&m.returns, 0.95, min_samples);
            let max_corr = max_abs.get(&m.id).copied().unwrap_or(0.0);
            let concentration = fraction(m.gross, portfolio_gross);
            let exposure_fraction = fraction(m.gross, portfolio_equity);
            let drawdown = m.realized_dd.max(m.marked_dd);
            let daily_loss = (-m.daily).to_f64().unwrap_or(0.0);

            self.check(AlertKind::ValueAtRisk, &scope, None, var_95, limits.max_var_95, warning, now);
            self.check(AlertKind::Drawdown, &scope, None, drawdown, limits.max_drawdown, warning, now);
            self.check(AlertKind::DailyLoss, &scope, None, daily_loss, daily_limit, warning, now);
            self.check(AlertKind::Correlation, &scope, None, max_corr, limits.max_correlation, warning, now);
            self.check(AlertKind::Concentration, &scope, None, concentration, limits.max_concentration, warning, now);

            let state = RiskState {
                scope,
                gross_exposure: m.gross,
                exposure_fraction,
                realized_drawdown: m.realized_dd,
                unrealized_drawdown: m.marked_dd,
                var_95,
                var_99,
                expected_shortfall_95: es_95,
                max_abs_correlation: max_corr,
                concentration,
                daily_pnl: m.daily,
                updated_at: now,
            };
            self.states.insert(m.id.clone(), state.clone());
            states.push(state);
        }

        // Per-asset concentration across the whole portfolio
        let mut top_share = 0.0f64;
        for (asset, gross) in &asset_gross {
            let share = fraction(*gross, portfolio_gross);
            self.check(
                AlertKind::Concentration,
                &RiskScope::Portfolio,
                Some(asset.clone()),
                share,
                limits.max_concentration,
                warning,
                now,
            );
            if share > top_share {
                top_share = share;
            }
        }

        let marked_equity = portfolio_equity + total_unrealized;
        let (portfolio_returns, portfolio_realized_dd, portfolio_marked_dd) = {
            let mut portfolio = self.portfolio.write().unwrap_or_else(|e| e.into_inner());
            if portfolio_equity > portfolio.peak_equity {
                portfolio.peak_equity = portfolio_equity;
            }
            if marked_equity > portfolio.peak_marked {
                portfolio.peak_marked = marked_equity;
            }
            (
                portfolio.returns.iter().copied().collect::<Vec<f64>>(),
                drawdown_fraction(portfolio.peak_equity, portfolio_equity),
                drawdown_fraction(portfolio.peak_marked, marked_equity),
            )
        };

        let var_95 = var_or_zero(&portfolio_returns, 0.95, min_samples);
        let var_99 = var_or_zero(&portfolio_returns, 0.99, min_samples);
        let es_95 = shortfall_or_zero(&portfolio_returns, 0.95, min_samples);
        let exposure_fraction = fraction(portfolio_gross, portfolio_equity);
        let drawdown = portfolio_realized_dd.max(portfolio_marked_dd);
        let daily_loss = (-total_daily).to_f64().unwrap_or(0.0);
        let global_corr = max_abs.values().fold(0.0f64, |acc, v| acc.max(*v));
        let scope = RiskScope::Portfolio;

        self.check(AlertKind::ValueAtRisk, &scope, None, var_95, limits.max_var_95, warning, now);
        self.check(AlertKind::Drawdown, &scope, None, drawdown, limits.max_drawdown, warning, now);
        self.check(AlertKind::DailyLoss, &scope, None, daily_loss, daily_limit, warning, now);
        self.check(
            AlertKind::Exposure,
            &scope,
            None,
            exposure_fraction,
            limits.max_exposure_fraction,
            warning,
            now,
        );

        let portfolio_state = RiskState {
            scope,
            gross_exposure: portfolio_gross,
            exposure_fraction,
            realized_drawdown: portfolio_realized_dd,
            unrealized_drawdown: portfolio_marked_dd,
            var_95,
            var_99,
            expected_shortfall_95: es_95,
            max_abs_correlation: global_corr,
            concentration: top_share,
            daily_pnl: total_daily,
            updated_at: now,
        };
        self.states
            .insert(RiskScope::Portfolio.key().to_string(), portfolio_state.clone());
        states.insert(0, portfolio_state);
        states
    }

    /// Last evaluated state for a scope, if any.
    pub fn state(&self, scope: &RiskScope) -> Option<RiskState> {
        self.states.get(scope.key()).map(|e| e.value().clone())
    }

    /// Zeroes daily PnL everywhere and closes open daily-loss episodes.
    pub fn reset_daily(&self) {
        for mut book in self.books.iter_mut() {
            book.daily_pnl = Decimal::ZERO;
        }
        self.episodes
            .retain(|(kind, _), _| *kind != AlertKind::DailyLoss);
        debug!("[RISK] Daily PnL reset");
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<RiskAlert> {
        self.alert_tx.subscribe()
    }

    pub fn limits(&self) -> RiskLimitConfig {
        self.config.limits.clone()
    }

    /// Capital plus cumulative realized PnL across all strategies.
    pub fn portfolio_equity(&self) -> Decimal {
        let realized: Decimal = self.books.iter().map(|b| b.realized_pnl).sum();
        self.config.initial_capital + realized
    }

    pub fn gross_exposure(&self) -> Decimal {
        self.books.iter().map(|b| self.book_gross(b.value())).sum()
    }

    pub fn strategy_exposure(&self, strategy_id: &str) -> Decimal {
        self.books
            .get(strategy_id)
            .map(|b| self.book_gross(b.value()))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn asset_exposure(&self, asset: &str) -> Decimal {
        let mut total = Decimal::ZERO;
        for book in self.books.iter() {
            if let Some(position) = book.positions.get(asset) {
                total += position.notional(self.mark_for(asset, position));
            }
        }
        total
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.books.iter().map(|b| b.daily_pnl).sum()
    }

    pub fn strategy_daily_pnl(&self, strategy_id: &str) -> Option<Decimal> {
        self.books.get(strategy_id).map(|b| b.daily_pnl)
    }

    pub fn position(&self, strategy_id: &str, asset: &str) -> Option<StrategyPosition> {
        self.books
            .get(strategy_id)
            .and_then(|b| b.positions.get(asset).cloned())
    }

    pub fn positions(&self, strategy_id: &str) -> Vec<StrategyPosition> {
        self.books
            .get(strategy_id)
            .map(|b| b.positions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Cached correlation between two strategies from the last evaluation.
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.correlations.get(&ordered_pair(a, b)).map(|e| *e.value())
    }

    /// Largest cached absolute correlation between this strategy and any
    /// other live strategy. Never blocks on recomputation.
    pub fn max_abs_correlation_with(&self, strategy_id: &str) -> f64 {
        let mut max_corr = 0.0f64;
        for entry in self.correlations.iter() {
            let (a, b) = entry.key();
            if a == strategy_id || b == strategy_id {
                max_corr = max_corr.max(entry.value().abs());
            }
        }
        max_corr
    }

    pub fn halt_strategy(&self, strategy_id: &str, reason: impl Into<String>) {
        self.halts.halt(strategy_id, reason, self.clock.now());
    }

    pub fn resume_strategy(&self, strategy_id: &str) -> bool {
        self.halts.resume(strategy_id)
    }

    pub fn is_halted(&self, strategy_id: &str) -> bool {
        self.halts.is_halted(strategy_id)
    }

    pub fn emergency_stop(&self, reason: impl Into<String>) {
        self.halts.emergency_stop(reason, self.clock.now());
    }

    pub fn resume_all(&self) {
        self.halts.resume_all();
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.halts.is_emergency_stopped()
    }

    pub fn halt_registry(&self) -> &HaltRegistry {
        &self.halts
    }

    fn maybe_roll_day(&self) {
        let today = self.clock.now().date_naive();
        let mut day = self.day.write().unwrap_or_else(|e| e.into_inner());
        if *day != today {
            *day = today;
            drop(day);
            self.reset_daily();
        }
    }

    fn mark_for(&self, asset: &str, position: &StrategyPosition) -> Price {
        self.marks
            .get(asset)
            .map(|m| *m.value())
            .or(position.last_mark)
            .unwrap_or(position.avg_entry_price)
    }

    fn book_gross(&self, book: &StrategyBook) -> Decimal {
        book.positions
            .iter()
            .map(|(asset, p)| p.notional(self.mark_for(asset, p)))
            .sum()
    }

    #[allow(clippy::too_many_arguments)]
    fn check(
        &self,
        kind: AlertKind,
        scope: &RiskScope,
        asset: Option<AssetId>,
        value: f64,
        limit: f64,
        warning_fraction: f64,
        now: Timestamp,
    ) {
        let episode_key = match &asset {
            Some(asset) => (kind, format!("{}|{asset}", scope.key())),
            None => (kind, scope.key().to_string()),
        };
        let severity = transition(&self.episodes, episode_key, value, limit * warning_fraction, limit);
        if let Some(severity) = severity {
            self.raise(kind, severity, scope.clone(), asset, value, limit, now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn raise(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        scope: RiskScope,
        asset: Option<AssetId>,
        breach_value: f64,
        limit_value: f64,
        now: Timestamp,
    ) {
        let message = match &asset {
            Some(asset) => format!(
                "{scope} {kind} at {breach_value:.4} against limit {limit_value:.4} on {asset}"
            ),
            None => {
                format!("{scope} {kind} at {breach_value:.4} against limit {limit_value:.4}")
            }
        };
        match severity {
            AlertSeverity::Warning => warn!("[RISK] {message}"),
            AlertSeverity::Critical => error!("[RISK] {message}"),
        }
        let alert = RiskAlert {
            id: Uuid::new_v4(),
            kind,
            severity,
            scope: scope.clone(),
            asset,
            breach_value,
            limit_value,
            message: message.clone(),
            timestamp: now,
        };
        let _ = self.alert_tx.send(alert);

        if severity == AlertSeverity::Critical {
            match &scope {
                RiskScope::Strategy(id) if self.config.auto_halt => {
                    self.halts.halt(id, message, now);
                }
                RiskScope::Portfolio if self.config.auto_emergency_stop => {
                    self.halts.emergency_stop(message, now);
                }
                _ => {}
            }
        }
    }
}

struct Measured {
    id: StrategyId,
    gross: Decimal,
    unrealized: Decimal,
    realized: Decimal,
    daily: Decimal,
    returns: Vec<f64>,
    realized_dd: f64,
    marked_dd: f64,
}

/// Moves one episode through Clear -> Warned -> Breached and back,
/// returning a severity only on transitions that deserve an alert.
fn transition(
    episodes: &DashMap<EpisodeKey, Episode>,
    key: EpisodeKey,
    value: f64,
    warning: f64,
    critical: f64,
) -> Option<AlertSeverity> {
    let prev = episodes
        .get(&key)
        .map(|e| *e.value())
        .unwrap_or(Episode::Clear);
    if value >= critical {
        episodes.insert(key, Episode::Breached);
        (prev != Episode::Breached).then_some(AlertSeverity::Critical)
    } else if value >= warning {
        // an open breach only closes below the warning boundary
        if prev == Episode::Clear {
            episodes.insert(key, Episode::Warned);
            Some(AlertSeverity::Warning)
        } else {
            None
        }
    } else {
        if prev != Episode::Clear {
            episodes.insert(key, Episode::Clear);
        }
        None
    }
}

fn ordered_pair(a: &str, b: &str) -> (StrategyId, StrategyId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn drawdown_fraction(peak: Decimal, current: Decimal) -> f64 {
    if peak <= Decimal::ZERO || current >= peak {
        return 0.0;
    }
    ((peak - current) / peak).to_f64().unwrap_or(0.0)
}

fn fraction(value: Decimal, base: Decimal) -> f64 {
    if base <= Decimal::ZERO {
        return 0.0;
    }
    (value / base).to_f64().unwrap_or(0.0)
}

fn var_or_zero(returns: &[f64], confidence: f64, min_samples: usize) -> f64 {
    if returns.len() < min_samples {
        return 0.0;
    }
    value_at_risk(returns, confidence).unwrap_or(0.0)
}

fn shortfall_or_zero(returns: &[f64], confidence: f64, min_samples: usize) -> f64 {
    if returns.len() < min_samples {
        return 0.0;
    }
    expected_shortfall(returns, confidence).unwrap_or(0.0)
}
