//! Condition debouncer.
//!
//! A `Hysteresis` only reports a state change once the requested state has
//! held continuously for a configured interval. The two directions (false
//! to true, true to false) have independent intervals. Used for
//! auto-disarm-on-land, kill-switch-confirmed disarm, offboard availability
//! and the battery action delay.

/// Debounced boolean state.
#[derive(Debug, Clone)]
pub struct Hysteresis {
    state: bool,
    requested_state: bool,
    time_from_false_us: u64,
    time_from_true_us: u64,
    last_time_to_change_state_us: u64,
}

impl Hysteresis {
    /// Create with the given initial state and zero transition delays.
    pub const fn new(initial_state: bool) -> Self {
        Self {
            state: initial_state,
            requested_state: initial_state,
            time_from_false_us: 0,
            time_from_true_us: 0,
            last_time_to_change_state_us: 0,
        }
    }

    /// Current debounced state.
    pub fn get_state(&self) -> bool {
        self.state
    }

    /// Set the hold interval required to leave `from_state`.
    pub fn set_hysteresis_time_from(&mut self, from_state: bool, time_us: u64) {
        if from_state {
            self.time_from_true_us = time_us;
        } else {
            self.time_from_false_us = time_us;
        }
    }

    /// Request a state and advance the debouncer.
    ///
    /// Returns the debounced state after the update. The state flips only
    /// once `new_state` has been requested continuously for the configured
    /// interval; any interruption restarts the timer.
    pub fn set_state_and_update(&mut self, new_state: bool, now_us: u64) -> bool {
        if new_state != self.state {
            if new_state != self.requested_state {
                self.requested_state = new_state;
                self.last_time_to_change_state_us = now_us;
            }
        } else {
            self.requested_state = self.state;
        }

        self.update(now_us)
    }

    fn update(&mut self, now_us: u64) -> bool {
        if self.requested_state != self.state {
            let required = if self.state {
                self.time_from_true_us
            } else {
                self.time_from_false_us
            };

            if now_us.saturating_sub(self.last_time_to_change_state_us) >= required {
                self.state = self.requested_state;
            }
        }

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_changes_immediately() {
        let mut h = Hysteresis::new(false);
        assert!(!h.get_state());
        assert!(h.set_state_and_update(true, 1000));
        assert!(!h.set_state_and_update(false, 2000));
    }

    #[test]
    fn change_only_after_hold_interval() {
        let mut h = Hysteresis::new(false);
        h.set_hysteresis_time_from(false, 2_000_000);

        assert!(!h.set_state_and_update(true, 0));
        assert!(!h.set_state_and_update(true, 1_000_000));
        assert!(!h.set_state_and_update(true, 1_999_999));
        assert!(h.set_state_and_update(true, 2_000_000));
    }

    #[test]
    fn interruption_restarts_timer() {
        let mut h = Hysteresis::new(false);
        h.set_hysteresis_time_from(false, 2_000_000);

        assert!(!h.set_state_and_update(true, 0));
        assert!(!h.set_state_and_update(true, 1_500_000));
        // condition dropped for one update
        assert!(!h.set_state_and_update(false, 1_600_000));
        // must hold for the full interval again
        assert!(!h.set_state_and_update(true, 1_700_000));
        assert!(!h.set_state_and_update(true, 3_600_000));
        assert!(h.set_state_and_update(true, 3_700_000));
    }

    #[test]
    fn independent_directions() {
        let mut h = Hysteresis::new(true);
        h.set_hysteresis_time_from(true, 5_000_000);
        h.set_hysteresis_time_from(false, 1_000_000);

        // true -> false takes 5 s
        assert!(h.set_state_and_update(false, 0));
        assert!(h.set_state_and_update(false, 4_999_999));
        assert!(!h.set_state_and_update(false, 5_000_000));

        // false -> true takes 1 s
        assert!(!h.set_state_and_update(true, 5_500_000));
        assert!(h.set_state_and_update(true, 6_500_000));
    }

    #[test]
    fn repeated_requests_do_not_reset_timer() {
        let mut h = Hysteresis::new(false);
        h.set_hysteresis_time_from(false, 1_000_000);

        for t in (0..=900_000).step_by(100_000) {
            assert!(!h.set_state_and_update(true, t));
        }
        assert!(h.set_state_and_update(true, 1_000_000));
    }
}
