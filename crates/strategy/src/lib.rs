//! Proteus Strategy Manager / Adaptation Engine
//!
//! Owns the set of adaptive strategies and turns detected market patterns
//! into bounded parameter adjustments:
//! - Strategy arena with per-entry locking (independent strategies adapt
//!   in parallel, writes to one strategy never interleave)
//! - Rule interpreter: closed comparator expressions over pattern
//!   characteristics and published performance snapshots
//! - Deltas scaled by learning rate and pattern strength, clamped into
//!   risk limits and a drift band around the base value
//! - Rate limiting with a deferred-signal queue ordered by eligibility
//!   time (early requests queue, they are never dropped)
//! - Append-only adaptation history in a bounded FIFO
//!
//! The engine reads performance through the analyzer's snapshot handle;
//! it never holds references back into the analyzer.

pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod record;
pub mod rules;

pub use config::StrategyManagerConfig;
pub use error::{RuleFault, StrategyError, StrategyResult};
pub use manager::StrategyManager;
pub use model::{
    AdaptiveStrategy, PerformanceTargets, RiskLimits, StrategyConfig, StrategyKind, params,
};
pub use record::{AdaptationRecord, AdaptationReport, ParameterAdjustment, RuleFailure};
pub use rules::{AdaptationRule, MetricField, Observable, ParameterDelta, RuleCondition};
