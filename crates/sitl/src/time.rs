//! Lockstep simulation clock.
//!
//! The simulation advances in discrete steps; every component sees the
//! same microsecond timestamp within a step, which keeps scenario tests
//! deterministic.

use std::cell::Cell;
use std::rc::Rc;

use strato_core::traits::TimeSource;

/// Shared lockstep clock. Clones observe the same time.
#[derive(Clone, Default)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the simulation by `us` microseconds.
    pub fn advance(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, us: u64) {
        self.now_us.set(us);
    }
}

impl TimeSource for SimClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();

        clock.advance(10_000);
        assert_eq!(other.now_us(), 10_000);

        other.advance(5_000);
        assert_eq!(clock.now_us(), 15_000);
    }
}
