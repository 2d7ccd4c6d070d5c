//! Wind speed monitor.
//!
//! Two thresholds: a warn level with a 60 s quiet period between warnings,
//! and a max level that requests a return. Neither fires while a return or
//! landing is already in progress.

use crate::status::Wind;

/// Quiet period between repeated wind warnings.
const WARNING_INTERVAL_US: u64 = 60_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindAction {
    None,
    /// Advise the operator to land.
    Warn,
    /// Abort the operation and return.
    ReturnToLaunch,
}

#[derive(Debug, Default)]
pub struct WindMonitor {
    last_warning: u64,
}

impl WindMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the wind estimate against the thresholds.
    ///
    /// Thresholds at or below zero are disabled.
    pub fn update(
        &mut self,
        wind: &Wind,
        warn_threshold: f32,
        max_threshold: f32,
        in_return_or_land: bool,
        now_us: u64,
    ) -> WindAction {
        if in_return_or_land {
            return WindAction::None;
        }

        let speed = wind.speed();

        if max_threshold > 0.0 && speed > max_threshold {
            return WindAction::ReturnToLaunch;
        }

        let quiet_over =
            self.last_warning == 0 || now_us.saturating_sub(self.last_warning) > WARNING_INTERVAL_US;

        if warn_threshold > 0.0 && speed > warn_threshold && quiet_over {
            self.last_warning = now_us;
            return WindAction::Warn;
        }

        WindAction::None
    }
}
