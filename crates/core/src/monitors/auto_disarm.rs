//! Auto-disarm timers.
//!
//! Two debounced conditions: landed-for-N-seconds (or never-taken-off for
//! the preflight variant) and kill-switch/lockdown-engaged-for-N-seconds.

use crate::hysteresis::Hysteresis;

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDisarmEvent {
    /// Landed long enough after a flight.
    Landed,
    /// Armed on the ground without ever taking off.
    Preflight,
    /// Kill switch held long enough.
    KillSwitch,
    /// Lockdown active long enough.
    Lockdown,
}

#[derive(Debug)]
pub struct AutoDisarm {
    landed: Hysteresis,
    killed: Hysteresis,
}

impl AutoDisarm {
    pub fn new() -> Self {
        Self {
            landed: Hysteresis::new(false),
            killed: Hysteresis::new(false),
        }
    }

    /// Configure the kill-switch confirmation delay.
    pub fn set_kill_timeout(&mut self, seconds: f32) {
        self.killed
            .set_hysteresis_time_from(false, (seconds.max(0.0) * 1e6) as u64);
    }

    /// Configure the landed timer (caller switches between the landed and
    /// preflight intervals).
    pub fn set_land_timeout(&mut self, seconds: f32) {
        self.landed
            .set_hysteresis_time_from(false, (seconds.max(0.0) * 1e6) as u64);
    }

    /// Advance the landed timer. Fires only after the condition held
    /// continuously for the configured interval.
    pub fn update_landed(
        &mut self,
        condition: bool,
        have_taken_off: bool,
        now_us: u64,
    ) -> Option<AutoDisarmEvent> {
        if self.landed.set_state_and_update(condition, now_us) {
            if have_taken_off {
                Some(AutoDisarmEvent::Landed)
            } else {
                Some(AutoDisarmEvent::Preflight)
            }
        } else {
            None
        }
    }

    /// Advance the kill/lockdown timer.
    pub fn update_killed(
        &mut self,
        manual_lockdown: bool,
        lockdown: bool,
        now_us: u64,
    ) -> Option<AutoDisarmEvent> {
        if self
            .killed
            .set_state_and_update(manual_lockdown || lockdown, now_us)
        {
            if manual_lockdown {
                Some(AutoDisarmEvent::KillSwitch)
            } else {
                Some(AutoDisarmEvent::Lockdown)
            }
        } else {
            None
        }
    }

    /// Reset both timers (on disarm).
    pub fn reset(&mut self, now_us: u64) {
        self.landed.set_state_and_update(false, now_us);
        self.killed.set_state_and_update(false, now_us);
    }
}

impl Default for AutoDisarm {
    fn default() -> Self {
        Self::new()
    }
}
