//! Proteus Performance Analyzer
//!
//! Measures per-strategy performance from trade flow:
//!
//! - Position book with weighted-average entry and realized-PnL
//!   attribution, so fills alone drive open/close accounting
//! - Rolling return series bounded by an evaluation window
//! - Incremental snapshot recomputation on every close event
//! - Max drawdown tracked against the all-time equity peak, not just
//!   the rolling window
//!
//! Snapshots are published through a [`SnapshotHandle`] read by the
//! adaptation engine; the analyzer is the only writer.

mod analyzer;
mod config;
mod error;
mod snapshot;

pub use analyzer::{FillOutcome, PerformanceAnalyzer};
pub use config::AnalyzerConfig;
pub use error::{AnalyzerError, AnalyzerResult};
pub use proteus_core::{FillApplication, StrategyPosition};
pub use snapshot::{AdaptationImpact, MarketPerformanceMetrics, SnapshotHandle};
