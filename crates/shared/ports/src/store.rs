use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

/// Registered strategy, flattened for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRow {
    pub strategy_id: String,
    pub kind: String,
    pub asset: String,
    pub timeframe: String,
    pub registered_at: DateTime<Utc>,
    /// Full config serialized as JSON
    pub config_json: String,
}

/// One applied (or clamped) adaptation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationRow {
    pub record_id: Uuid,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_ids: Vec<Uuid>,
    pub clamped: bool,
    /// Per-parameter deltas serialized as JSON
    pub deltas_json: String,
}

/// Point-in-time performance snapshot for a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshotRow {
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: u64,
}

/// Risk limit violation, recorded when an alert fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskViolationRow {
    pub timestamp: DateTime<Utc>,
    /// "portfolio" or the affected strategy id
    pub scope: String,
    pub kind: String,
    pub severity: String,
    pub breach_value: f64,
    pub limit_value: f64,
    pub message: String,
}

/// Port for durable engine state.
///
/// Implementations persist registrations, adaptation history, performance
/// snapshots and risk violations. The engine never reads its hot state back
/// from the store; rows exist for audit and restart.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_strategy(&self, row: StrategyRow) -> StoreResult<()>;

    async fn append_adaptation(&self, row: AdaptationRow) -> StoreResult<()>;

    async fn append_snapshot(&self, row: PerformanceSnapshotRow) -> StoreResult<()>;

    async fn append_violation(&self, row: RiskViolationRow) -> StoreResult<()>;

    /// Most recent adaptations for a strategy, newest first
    async fn adaptations(&self, strategy_id: &str, limit: usize) -> StoreResult<Vec<AdaptationRow>>;
}
