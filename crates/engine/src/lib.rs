//! Engine context for the adaptive strategy system.
//!
//! Wires the pattern detector, strategy manager, performance analyzer,
//! risk monitor and order gate into a single lifecycle. [`Engine::start`]
//! spawns background loops for market ingestion, fill ingestion, pattern
//! detection, risk monitoring, deferred adaptation and alert persistence;
//! [`Engine::shutdown`] closes the gate first, then signals the loops and
//! waits for them to drain.
//!
//! Also provides the in-memory [`StateStore`](proteus_ports::StateStore)
//! implementation and the feed adapters (channel-backed and synthetic)
//! used by simulations and tests.

mod config;
mod engine;
mod feeds;
mod store;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus};
pub use feeds::{ChannelFillFeed, ChannelMarketFeed, SyntheticFeed, SyntheticFeedConfig};
pub use store::InMemoryStore;
