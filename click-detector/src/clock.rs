//! Monotonic clock abstraction.
//!
//! The refractory gate in the transient detector measures elapsed time
//! between accepted events. The clock is injected at construction so that
//! tests can drive arbitrary timestamps deterministically.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic timestamps.
pub trait MonotonicClock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real clock backed by `Instant::now`.
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock for tests. Time only moves when told to.
pub struct ManualClock {
    current: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    /// Advance the virtual clock by the given duration.
    pub fn advance(&self, by: Duration) {
        *self.current.lock().unwrap() += by;
    }

    /// Set the virtual clock to a specific instant.
    pub fn set(&self, to: Instant) {
        *self.current.lock().unwrap() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap()
    }
}

/// Clock handle shared with the detector.
pub type SharedClock = Arc<dyn MonotonicClock>;

/// Create the real clock used by the service binary.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_advances_only_on_demand() {
        let clock = ManualClock::new();
        let start = clock.now();

        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(300));
        assert_eq!(clock.now() - start, Duration::from_millis(300));

        clock.advance(Duration::from_millis(10));
        assert_eq!(clock.now() - start, Duration::from_millis(310));
    }

    #[test]
    fn manual_clock_set_overrides_current_time() {
        let clock = ManualClock::new();
        let target = Instant::now() + Duration::from_secs(5);

        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
