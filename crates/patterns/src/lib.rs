//! Proteus Pattern Detector
//!
//! Classifies recurring market structures from bounded sample windows:
//!
//! - **Trend**: sustained directional drift with sub-window agreement
//! - **Reversal**: two opposing legs around a swing extreme
//! - **Breakout**: price clearing a prior extreme on elevated volume
//! - **Consolidation**: tight range with negligible drift
//! - **Volatility**: recent volatility expanding against the baseline
//!
//! Detection is purely functional and deterministic: no wall clock, no
//! randomness, ordered maps, and pattern ids derived from window content,
//! so identical windows yield byte-identical patterns.

mod classify;
mod config;
mod detector;
mod error;
mod features;
mod model;

pub use config::DetectorConfig;
pub use detector::{PatternDetector, PatternScan};
pub use error::{DetectError, DetectResult};
pub use features::WindowFeatures;
pub use model::{
    Comparator, DetectedPattern, ExpectedOutcome, OutcomeDirection, PatternKind, TriggerCondition,
};
