//! Time abstraction for the supervisory loops.
//!
//! All timestamps in this crate are monotonic microseconds from a single
//! clock source, injected through the `TimeSource` trait so that the
//! commander and navigator can be driven deterministically in tests and in
//! lockstep simulation.

use core::cell::Cell;

/// Monotonic time provider for the supervisory tasks.
///
/// Implementations: the SITL lockstep clock, or `MockTime` for unit tests.
pub trait TimeSource: Clone {
    /// Current time in microseconds since boot.
    fn now_us(&self) -> u64;

    /// Current time in milliseconds since boot.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }

    /// Elapsed microseconds since a reference timestamp.
    ///
    /// Saturates to zero if the reference lies in the future.
    fn elapsed_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }
}

/// Controllable time source for deterministic tests.
#[derive(Clone, Default)]
pub struct MockTime {
    current_us: Cell<u64>,
}

impl MockTime {
    /// Create a clock starting at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given microsecond timestamp.
    pub fn with_initial(us: u64) -> Self {
        Self {
            current_us: Cell::new(us),
        }
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, us: u64) {
        self.current_us.set(us);
    }

    /// Advance the clock by `us` microseconds.
    pub fn advance(&self, us: u64) {
        self.current_us.set(self.current_us.get() + us);
    }
}

impl TimeSource for MockTime {
    fn now_us(&self) -> u64 {
        self.current_us.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_time_starts_at_zero() {
        let time = MockTime::new();
        assert_eq!(time.now_us(), 0);
        assert_eq!(time.now_ms(), 0);
    }

    #[test]
    fn mock_time_advance_and_set() {
        let time = MockTime::new();
        time.advance(500_000);
        assert_eq!(time.now_us(), 500_000);
        time.set(2_000_000);
        assert_eq!(time.now_ms(), 2000);
    }

    #[test]
    fn elapsed_since_saturates() {
        let time = MockTime::with_initial(1_000);
        assert_eq!(time.elapsed_since(5_000), 0);
        assert_eq!(time.elapsed_since(400), 600);
    }
}
