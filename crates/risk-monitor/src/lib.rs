//! Proteus Risk Monitor
//!
//! Maintains portfolio and per-strategy risk state, recomputed on every
//! fill and on an independent monitoring tick so passive drift (such as
//! correlation changes) is caught without trade flow.
//!
//! Limit breaches raise broadcast alerts that are idempotent per breach
//! episode: an active breach never re-alerts, and an episode only closes
//! once the value falls back below the warning boundary. Critical
//! breaches trigger automatic halts when enabled.
//!
//! Halts are reversible only by explicit resume; the emergency stop
//! halts everything.

mod alerts;
mod config;
mod error;
mod halt;
mod monitor;
mod state;

pub use alerts::{AlertKind, AlertSeverity, RiskAlert};
pub use config::{RiskLimitConfig, RiskMonitorConfig};
pub use error::{RiskError, RiskResult};
pub use halt::{HaltInfo, HaltRegistry};
pub use monitor::RiskMonitor;
pub use state::{RiskScope, RiskState};
