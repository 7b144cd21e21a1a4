use std::sync::RwLock;

use chrono::Duration;
use proteus_core::Timestamp;
use proteus_ports::Clock;

/// Manually driven clock for deterministic tests
///
/// Time only moves when `advance` or `set` is called, so tests exercising
/// rate limits and daily resets never have to sleep.
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move time forward by the given duration
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_manual_clock_only_moves_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), start + Duration::minutes(30));
    }

    #[test]
    fn test_manual_clock_set_jumps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 1).unwrap();
        let clock = ManualClock::new(start);

        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_manual_clock_as_trait_object() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(ManualClock::new(start));

        assert_eq!(clock.now(), start);
        assert_eq!(clock.name(), "ManualClock");
    }
}
