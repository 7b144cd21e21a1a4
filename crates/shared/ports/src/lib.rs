//! Proteus Ports
//!
//! Port definitions (traits) for the Proteus strategy engine.
//! These define the boundaries between domain logic and infrastructure.

mod clock;
mod error;
mod feeds;
mod store;

pub use clock::Clock;
pub use error::{StoreError, StoreResult};
pub use feeds::{FillFeed, MarketDataFeed};
pub use store::{
    AdaptationRow, PerformanceSnapshotRow, RiskViolationRow, StateStore, StrategyRow,
};
