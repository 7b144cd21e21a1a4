//! Proteus Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: manually driven time for deterministic tests
//!
//! All engine components take `Arc<dyn Clock>` so tests can advance time
//! without sleeping.

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-exported so callers need only one clock import
pub use proteus_ports::Clock;
