//! Proteus Core Domain
//!
//! Pure domain types for the Proteus adaptive strategy engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod market;
pub mod orders;
pub mod position;
pub mod values;

// Re-export commonly used types at crate root
pub use market::{MarketEvent, MarketSample, SampleWindow, Timeframe};
pub use orders::{Fill, OrderProposal, ProposalId, Side};
pub use position::{FillApplication, StrategyPosition};
pub use values::{AssetId, Price, Quantity, StrategyId, Timestamp};
