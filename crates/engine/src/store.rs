//! In-memory [`StateStore`] used by simulations and tests.
//!
//! Every table is a plain Vec behind one mutex; writes append, strategy
//! rows upsert by id. Nothing here is durable, which is the point.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proteus_ports::{
    AdaptationRow, PerformanceSnapshotRow, RiskViolationRow, StateStore, StoreResult, StrategyRow,
};

#[derive(Debug, Default)]
struct Tables {
    strategies: Vec<StrategyRow>,
    adaptations: Vec<AdaptationRow>,
    snapshots: Vec<PerformanceSnapshotRow>,
    violations: Vec<RiskViolationRow>,
}

/// Non-durable store keeping all rows in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All registered strategy rows
    pub fn strategies(&self) -> Vec<StrategyRow> {
        self.lock().strategies.clone()
    }

    /// Total adaptation rows across all strategies
    pub fn adaptation_count(&self) -> usize {
        self.lock().adaptations.len()
    }

    /// All performance snapshot rows in append order
    pub fn snapshots(&self) -> Vec<PerformanceSnapshotRow> {
        self.lock().snapshots.clone()
    }

    /// All recorded risk violations in append order
    pub fn violations(&self) -> Vec<RiskViolationRow> {
        self.lock().violations.clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn save_strategy(&self, row: StrategyRow) -> StoreResult<()> {
        let mut tables = self.lock();
        match tables
            .strategies
            .iter_mut()
            .find(|existing| existing.strategy_id == row.strategy_id)
        {
            Some(existing) => *existing = row,
            None => tables.strategies.push(row),
        }
        Ok(())
    }

    async fn append_adaptation(&self, row: AdaptationRow) -> StoreResult<()> {
        self.lock().adaptations.push(row);
        Ok(())
    }

    async fn append_snapshot(&self, row: PerformanceSnapshotRow) -> StoreResult<()> {
        self.lock().snapshots.push(row);
        Ok(())
    }

    async fn append_violation(&self, row: RiskViolationRow) -> StoreResult<()> {
        self.lock().violations.push(row);
        Ok(())
    }

    async fn adaptations(&self, strategy_id: &str, limit: usize) -> StoreResult<Vec<AdaptationRow>> {
        let tables = self.lock();
        Ok(tables
            .adaptations
            .iter()
            .rev()
            .filter(|row| row.strategy_id == strategy_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
