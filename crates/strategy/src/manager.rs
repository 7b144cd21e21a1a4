use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use priority_queue::PriorityQueue;
use proteus_analyzer::SnapshotHandle;
use proteus_core::{StrategyId, Timestamp};
use proteus_patterns::DetectedPattern;
use proteus_ports::Clock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::StrategyManagerConfig;
use crate::error::{RuleFault, StrategyError, StrategyResult};
use crate::model::{AdaptiveStrategy, RiskLimits, StrategyConfig};
use crate::record::{AdaptationRecord, AdaptationReport, ParameterAdjustment, RuleFailure};

/// Signal accumulated for a rate-limited strategy, deduplicated by
/// pattern id until the next eligible tick.
#[derive(Debug, Default)]
struct PendingSignal {
    patterns: Vec<DetectedPattern>,
    seen: HashSet<Uuid>,
}

impl PendingSignal {
    fn absorb(&mut self, pattern: DetectedPattern) {
        if self.seen.insert(pattern.id) {
            self.patterns.push(pattern);
        }
    }
}

/// The strategy arena and adaptation engine.
///
/// Entries lock individually: independent strategies adapt in parallel,
/// while two adaptation paths for the same strategy serialize on its
/// arena entry. Cheap to clone, all state is shared.
#[derive(Clone)]
pub struct StrategyManager {
    config: StrategyManagerConfig,
    clock: Arc<dyn Clock>,
    strategies: Arc<DashMap<StrategyId, AdaptiveStrategy>>,
    pending: Arc<DashMap<StrategyId, PendingSignal>>,
    /// Deferred strategies keyed by eligibility time, earliest first
    queue: Arc<Mutex<PriorityQueue<StrategyId, Reverse<Timestamp>>>>,
    history: Arc<Mutex<VecDeque<AdaptationRecord>>>,
    snapshots: SnapshotHandle,
}

impl StrategyManager {
    pub fn new(
        config: StrategyManagerConfig,
        clock: Arc<dyn Clock>,
        snapshots: SnapshotHandle,
    ) -> Self {
        Self {
            config,
            clock,
            strategies: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            queue: Arc::new(Mutex::new(PriorityQueue::new())),
            history: Arc::new(Mutex::new(VecDeque::new())),
            snapshots,
        }
    }

    pub fn register(&self, config: StrategyConfig) -> StrategyResult<()> {
        let now = self.clock.now();
        match self.strategies.entry(config.strategy_id.clone()) {
            Entry::Occupied(_) => Err(StrategyError::DuplicateStrategy(config.strategy_id)),
            Entry::Vacant(slot) => {
                info!(
                    "[ADAPT] Registered strategy {} ({}) on {} {}",
                    config.strategy_id,
                    config.kind,
                    config.asset,
                    config.timeframe.as_str()
                );
                slot.insert(AdaptiveStrategy::from_config(config, now));
                Ok(())
            }
        }
    }

    pub fn get(&self, strategy_id: &str) -> Option<AdaptiveStrategy> {
        self.strategies.get(strategy_id).map(|e| e.value().clone())
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Position-size cap the gate enforces for this strategy right now.
    pub fn live_max_position_size(&self, strategy_id: &str) -> StrategyResult<Decimal> {
        self.strategies
            .get(strategy_id)
            .map(|s| s.live_max_position_size())
            .ok_or_else(|| StrategyError::UnknownStrategy(strategy_id.to_string()))
    }

    /// Runs one adaptation round over the given patterns.
    ///
    /// Per strategy: filter patterns to the mandate and the confidence
    /// threshold, then either apply immediately or, when the strategy
    /// adapted less than `update_frequency` ago, queue the signal for
    /// `process_pending`. Rule faults are isolated into the report.
    pub fn adapt(&self, patterns: &[DetectedPattern]) -> AdaptationReport {
        let mut report = AdaptationReport::default();
        if patterns.is_empty() {
            return report;
        }
        let now = self.clock.now();
        for id in self.strategy_ids() {
            let Some(mut entry) = self.strategies.get_mut(&id) else {
                continue;
            };
            let strategy = entry.value_mut();
            let matching: Vec<&DetectedPattern> = patterns
                .iter()
                .filter(|p| {
                    strategy.matches(p) && p.confidence >= self.config.confidence_threshold
                })
                .collect();
            if matching.is_empty() {
                continue;
            }

            if let Some(eligible_at) = self.next_eligible(strategy, now) {
                let mut signal = PendingSignal::default();
                for pattern in &matching {
                    signal.absorb((*pattern).clone());
                }
                self.defer(&id, signal, eligible_at);
                debug!(
                    "[ADAPT] {id} rate limited, signal deferred until {eligible_at}"
                );
                report.deferred.push(id);
                continue;
            }

            // fold in anything deferred earlier, oldest signal first
            let mut batch = PendingSignal::default();
            if let Some((_, pending)) = self.pending.remove(&id) {
                for pattern in pending.patterns {
                    batch.absorb(pattern);
                }
            }
            for pattern in matching {
                batch.absorb(pattern.clone());
            }
            self.apply(strategy, &batch.patterns, now, &mut report);
        }
        report
    }

    /// Applies deferred adaptations whose eligibility time has arrived.
    pub fn process_pending(&self) -> AdaptationReport {
        let now = self.clock.now();
        let mut due: Vec<StrategyId> = Vec::new();
        {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            while let Some((_, Reverse(at))) = queue.peek() {
                if *at > now {
                    break;
                }
                if let Some((id, _)) = queue.pop() {
                    due.push(id);
                }
            }
        }

        let mut report = AdaptationReport::default();
        for id in due {
            let Some((_, pending)) = self.pending.remove(&id) else {
                continue;
            };
            let Some(mut entry) = self.strategies.get_mut(&id) else {
                continue;
            };
            let strategy = entry.value_mut();
            // another path may have adapted since this was queued
            if let Some(eligible_at) = self.next_eligible(strategy, now) {
                self.defer(&id, pending, eligible_at);
                report.deferred.push(id);
                continue;
            }
            self.apply(strategy, &pending.patterns, now, &mut report);
        }
        report
    }

    /// Most-recent-first slice of the adaptation history.
    pub fn history(&self, limit: usize) -> Vec<AdaptationRecord> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Strategies with queued signal awaiting eligibility.
    pub fn pending_strategies(&self) -> Vec<StrategyId> {
        self.pending.iter().map(|e| e.key().clone()).collect()
    }

    /// Time the strategy next becomes eligible, when rate limited.
    fn next_eligible(&self, strategy: &AdaptiveStrategy, now: Timestamp) -> Option<Timestamp> {
        let last = strategy.last_adapted_at?;
        let eligible_at = last + Duration::seconds(self.config.update_frequency_secs);
        (eligible_at > now).then_some(eligible_at)
    }

    fn defer(&self, strategy_id: &str, signal: PendingSignal, eligible_at: Timestamp) {
        match self.pending.entry(strategy_id.to_string()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for pattern in signal.patterns {
                    existing.absorb(pattern);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(signal);
            }
        }
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push(strategy_id.to_string(), Reverse(eligible_at));
    }

    /// Evaluates every rule against every pattern in the batch, sums the
    /// scaled deltas per parameter, applies them under the clamps, and
    /// records the adaptation. Runs under the strategy's entry lock.
    fn apply(
        &self,
        strategy: &mut AdaptiveStrategy,
        patterns: &[DetectedPattern],
        now: Timestamp,
        report: &mut AdaptationReport,
    ) {
        let snapshot = self.snapshots.get(&strategy.strategy_id);
        let mut requested: BTreeMap<String, f64> = BTreeMap::new();
        let mut pattern_ids: Vec<Uuid> = Vec::new();

        for pattern in patterns {
            let mut contributed = false;
            for rule in &strategy.rules {
                match rule.fires(pattern, snapshot.as_ref()) {
                    Ok(false) => {}
                    Ok(true) => {
                        let unknown = rule
                            .deltas
                            .iter()
                            .find(|d| !strategy.current_parameters.contains_key(&d.parameter));
                        if let Some(bad) = unknown {
                            self.fail_rule(
                                strategy,
                                rule.name.clone(),
                                RuleFault::UnknownParameter(bad.parameter.clone()),
                                report,
                            );
                            continue;
                        }
                        for delta in &rule.deltas {
                            let scaled =
                                delta.delta * self.config.learning_rate * pattern.strength;
                            *requested.entry(delta.parameter.clone()).or_insert(0.0) += scaled;
                        }
                        contributed = true;
                    }
                    Err(fault) => {
                        self.fail_rule(strategy, rule.name.clone(), fault, report);
                    }
                }
            }
            if contributed {
                pattern_ids.push(pattern.id);
            }
        }

        if requested.is_empty() {
            return;
        }

        let mut adjustments = Vec::with_capacity(requested.len());
        let mut any_clamped = false;
        for (parameter, requested_delta) in requested {
            let Some(&current) = strategy.current_parameters.get(&parameter) else {
                continue;
            };
            let target = current + requested_delta;
            let base = strategy
                .base_parameters
                .get(&parameter)
                .copied()
                .unwrap_or(current);
            let applied = clamp_parameter(
                &parameter,
                target,
                base,
                &strategy.risk_limits,
                self.config.max_drift_fraction,
            );
            let clamped = applied != target;
            if clamped {
                any_clamped = true;
                warn!(
                    "[ADAPT] {} parameter {} clamped from {:.6} to {:.6}",
                    strategy.strategy_id, parameter, target, applied
                );
            }
            strategy.current_parameters.insert(parameter.clone(), applied);
            adjustments.push(ParameterAdjustment {
                parameter,
                requested_delta,
                applied_delta: applied - current,
                clamped,
            });
        }

        strategy.last_adapted_at = Some(now);
        let record = AdaptationRecord {
            record_id: Uuid::new_v4(),
            strategy_id: strategy.strategy_id.clone(),
            timestamp: now,
            pattern_ids,
            adjustments,
            clamped: any_clamped,
            snapshot,
        };
        info!(
            "[ADAPT] Adapted {} ({} adjustment(s), {} pattern(s), clamped: {})",
            record.strategy_id,
            record.adjustments.len(),
            record.pattern_ids.len(),
            record.clamped
        );
        self.push_history(record.clone());
        report.applied.push(record);
    }

    fn fail_rule(
        &self,
        strategy: &AdaptiveStrategy,
        rule: String,
        fault: RuleFault,
        report: &mut AdaptationReport,
    ) {
        warn!(
            "[ADAPT] Rule '{}' failed for {}: {fault}",
            rule, strategy.strategy_id
        );
        report.failures.push(RuleFailure {
            strategy_id: strategy.strategy_id.clone(),
            rule,
            fault,
        });
    }

    fn push_history(&self, record: AdaptationRecord) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push_back(record);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }
}

/// Drift band first, risk bound last so the limit invariant always wins.
/// Parameters with a zero base have no meaningful band and skip it.
fn clamp_parameter(
    parameter: &str,
    target: f64,
    base: f64,
    limits: &RiskLimits,
    max_drift_fraction: f64,
) -> f64 {
    let mut value = target;
    if base != 0.0 {
        let half_band = base.abs() * max_drift_fraction;
        value = value.clamp(base - half_band, base + half_band);
    }
    limits.clamp(parameter, value)
}
