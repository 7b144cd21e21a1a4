use chrono::Utc;
use proteus_core::Timestamp;
use proteus_ports::Clock;

/// Wall-clock time for production wiring
///
/// Each `now` call reads the operating system clock via [`Utc::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_readings_never_go_backwards() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();

        assert!(second >= first);
        assert_eq!(clock.name(), "SystemClock");
    }
}
