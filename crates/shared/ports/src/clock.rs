use proteus_core::Timestamp;

/// Source of the current time
///
/// Every time-sensitive decision (adaptation rate limits, reservation
/// expiry, daily counters) reads through this trait, so tests can drive
/// time by hand instead of sleeping.
pub trait Clock: Send + Sync {
    /// The current reading of this clock
    fn now(&self) -> Timestamp;

    /// Short identifier for logs
    fn name(&self) -> &str {
        "Clock"
    }
}
