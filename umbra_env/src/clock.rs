//! Clock abstraction shared by shadows that report time.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock instant that virtual time zero maps to (2024-01-01 00:00:00 UTC).
pub fn virtual_epoch() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1704067200)
}

/// Source of time for shadow code.
///
/// # Implementations
///
/// - **Virtual**: `Scheduler` - time only moves when a test advances it
/// - **Real**: `SystemClock` - wraps `Instant`/`SystemTime`, used by tooling
///   that needs to measure actual elapsed time
pub trait Clock: Send + Sync {
    /// Returns the monotonic time since the clock was created.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    ///
    /// For virtual clocks this is `virtual_epoch() + now()`.
    fn system_time(&self) -> SystemTime;

    /// Convenience: `now()` in whole milliseconds.
    fn now_millis(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

/// Real clock backed by the operating system.
pub struct SystemClock {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl SystemClock {
    /// Creates a clock starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_virtual_epoch() {
        let secs = virtual_epoch().duration_since(UNIX_EPOCH).unwrap().as_secs();
        assert_eq!(secs, 1704067200);
    }
}
