use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use log::{error, info, warn};
use proteus_core::{StrategyId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltInfo {
    pub reason: String,
    pub at: Timestamp,
}

/// Tracks per-strategy halts and the portfolio-wide emergency stop.
///
/// A halted strategy keeps its positions and history but fails order
/// validation until resumed. The emergency stop overrides everything
/// and requires an explicit `resume_all`.
#[derive(Debug, Default)]
pub struct HaltRegistry {
    halted: DashMap<StrategyId, HaltInfo>,
    emergency: AtomicBool,
    emergency_info: RwLock<Option<HaltInfo>>,
}

impl HaltRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self, strategy_id: &str, reason: impl Into<String>, at: Timestamp) {
        let reason = reason.into();
        error!("[RISK] Trading halted for {strategy_id}: {reason}");
        self.halted.insert(
            strategy_id.to_string(),
            HaltInfo { reason, at },
        );
    }

    /// Returns false when the strategy was not halted.
    pub fn resume(&self, strategy_id: &str) -> bool {
        let removed = self.halted.remove(strategy_id).is_some();
        if removed {
            info!("[RISK] Trading resumed for {strategy_id}");
        } else {
            warn!("[RISK] Resume requested for {strategy_id} but it was not halted");
        }
        removed
    }

    pub fn is_halted(&self, strategy_id: &str) -> bool {
        self.halted.contains_key(strategy_id)
    }

    pub fn halt_info(&self, strategy_id: &str) -> Option<HaltInfo> {
        self.halted.get(strategy_id).map(|e| e.value().clone())
    }

    pub fn halted(&self) -> Vec<(StrategyId, HaltInfo)> {
        self.halted
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn emergency_stop(&self, reason: impl Into<String>, at: Timestamp) {
        let reason = reason.into();
        error!("[RISK] EMERGENCY STOP: {reason}");
        self.emergency.store(true, Ordering::SeqCst);
        let mut info = self
            .emergency_info
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *info = Some(HaltInfo { reason, at });
    }

    /// Clears the emergency stop and every per-strategy halt.
    pub fn resume_all(&self) {
        info!("[RISK] Emergency stop cleared, all strategies resumed");
        self.emergency.store(false, Ordering::SeqCst);
        let mut info = self
            .emergency_info
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *info = None;
        self.halted.clear();
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    pub fn emergency_info(&self) -> Option<HaltInfo> {
        self.emergency_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_halt_and_resume() {
        let registry = HaltRegistry::new();
        assert!(!registry.is_halted("strat-1"));

        registry.halt("strat-1", "drawdown limit breached", t0());
        assert!(registry.is_halted("strat-1"));
        assert!(!registry.is_halted("strat-2"));

        let info = registry.halt_info("strat-1").unwrap();
        assert_eq!(info.reason, "drawdown limit breached");
        assert_eq!(info.at, t0());

        assert!(registry.resume("strat-1"));
        assert!(!registry.is_halted("strat-1"));
        assert!(!registry.resume("strat-1"));
    }

    #[test]
    fn test_emergency_stop_overrides() {
        let registry = HaltRegistry::new();
        registry.halt("strat-1", "daily loss", t0());
        registry.emergency_stop("portfolio VaR breach", t0());

        assert!(registry.is_emergency_stopped());
        assert_eq!(
            registry.emergency_info().unwrap().reason,
            "portfolio VaR breach"
        );

        registry.resume_all();
        assert!(!registry.is_emergency_stopped());
        assert!(registry.emergency_info().is_none());
        assert!(!registry.is_halted("strat-1"));
    }

    #[test]
    fn test_halted_listing() {
        let registry = HaltRegistry::new();
        registry.halt("a", "x", t0());
        registry.halt("b", "y", t0());
        let mut names: Vec<String> = registry.halted().into_iter().map(|(id, _)| id).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
