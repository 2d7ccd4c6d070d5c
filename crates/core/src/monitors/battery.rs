//! Battery failsafe monitor.
//!
//! Only *increases* of the warning level while armed trigger an action;
//! while disarmed the internal level just follows the estimate. The
//! configured action engages after an operator-reaction delay spent in
//! hold.

use crate::failsafe::LowBatteryAction;
use crate::status::{BatteryWarning, MainState};

/// Map a warning level onto the configured failsafe mode.
///
/// Returns `None` when the configuration asks for a warning only.
pub fn battery_failsafe_action(
    warning: BatteryWarning,
    config: LowBatteryAction,
) -> Option<MainState> {
    match (warning, config) {
        (_, LowBatteryAction::Warning) | (BatteryWarning::None, _) => None,
        (BatteryWarning::Low, LowBatteryAction::ReturnToLaunch)
        | (BatteryWarning::Low, LowBatteryAction::ReturnOrLand) => Some(MainState::AutoRtl),
        (BatteryWarning::Low, LowBatteryAction::Land) => Some(MainState::AutoLand),
        (BatteryWarning::Critical, LowBatteryAction::ReturnToLaunch) => Some(MainState::AutoRtl),
        (BatteryWarning::Critical, _) => Some(MainState::AutoLand),
        (BatteryWarning::Emergency, _) => Some(MainState::AutoLand),
    }
}

/// Outcome of one monitor update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryUpdate {
    /// Warning level increased while armed; the configured action applies.
    pub escalated: bool,
    /// Escalated all the way to EMERGENCY; attempt a platform shutdown.
    pub emergency: bool,
    /// Remaining flight time fell below the return estimate (one-shot).
    pub remaining_time_low: bool,
}

#[derive(Debug, Default)]
pub struct BatteryMonitor {
    warning: BatteryWarning,
    /// Non-zero while waiting out the operator-reaction delay.
    failsafe_timestamp: u64,
    rtl_time_actions_done: bool,
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted warning level (lags the estimate while armed).
    pub fn warning(&self) -> BatteryWarning {
        self.warning
    }

    pub fn in_action_delay(&self) -> bool {
        self.failsafe_timestamp != 0
    }

    /// Fold the current estimate into the monitor.
    pub fn update(
        &mut self,
        estimated_warning: BatteryWarning,
        low_remaining_time: bool,
        is_armed: bool,
        ground_contact: bool,
        in_return_or_land: bool,
        now_us: u64,
    ) -> BatteryUpdate {
        let mut result = BatteryUpdate::default();

        // Remaining-time check fires once per flight.
        if low_remaining_time
            && is_armed
            && !ground_contact
            && !self.rtl_time_actions_done
            && !in_return_or_land
        {
            self.rtl_time_actions_done = true;
            result.remaining_time_low = true;
        }

        if is_armed {
            if estimated_warning > self.warning {
                self.warning = estimated_warning;
                self.failsafe_timestamp = now_us;
                result.escalated = true;
                result.emergency = estimated_warning == BatteryWarning::Emergency;
            }
        } else {
            self.warning = estimated_warning;
            self.rtl_time_actions_done = false;
            self.failsafe_timestamp = 0;
        }

        result
    }

    /// Consume the pending delayed action once the delay elapsed.
    ///
    /// `in_hold_or_auto` mirrors the requirement that the vehicle waited in
    /// an autonomous mode; a manual takeover cancels the pending action on
    /// the next escalation instead.
    pub fn take_delayed_action(
        &mut self,
        config: LowBatteryAction,
        delay_s: f32,
        in_hold_or_auto: bool,
        now_us: u64,
    ) -> Option<MainState> {
        if self.failsafe_timestamp == 0 || !in_hold_or_auto {
            return None;
        }
        let delay_us = (delay_s.max(0.0) * 1e6) as u64;
        if now_us.saturating_sub(self.failsafe_timestamp) < delay_us {
            return None;
        }
        self.failsafe_timestamp = 0;
        battery_failsafe_action(self.warning, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_mapping() {
        use BatteryWarning::*;
        use LowBatteryAction::*;

        assert_eq!(battery_failsafe_action(Low, Warning), Option::None);
        assert_eq!(battery_failsafe_action(Low, ReturnToLaunch), Some(MainState::AutoRtl));
        assert_eq!(battery_failsafe_action(Low, ReturnOrLand), Some(MainState::AutoRtl));
        assert_eq!(battery_failsafe_action(Critical, ReturnOrLand), Some(MainState::AutoLand));
        assert_eq!(battery_failsafe_action(Emergency, Land), Some(MainState::AutoLand));
        assert_eq!(battery_failsafe_action(None, ReturnToLaunch), Option::None);
    }

    #[test]
    fn escalation_only_while_armed() {
        let mut monitor = BatteryMonitor::new();

        let result = monitor.update(BatteryWarning::Low, false, false, false, false, 1_000);
        assert!(!result.escalated);
        assert_eq!(monitor.warning(), BatteryWarning::Low);

        // arming with an already-low battery: escalation fires on the next
        // increase only
        let result = monitor.update(BatteryWarning::Low, false, true, false, false, 2_000);
        assert!(!result.escalated);

        let result = monitor.update(BatteryWarning::Critical, false, true, false, false, 3_000);
        assert!(result.escalated);
        assert!(!result.emergency);
    }

    #[test]
    fn warning_never_decreases_while_armed() {
        let mut monitor = BatteryMonitor::new();
        monitor.update(BatteryWarning::Critical, false, true, false, false, 1_000);
        monitor.update(BatteryWarning::Low, false, true, false, false, 2_000);
        assert_eq!(monitor.warning(), BatteryWarning::Critical);

        // disarmed: follows the estimate down
        monitor.update(BatteryWarning::None, false, false, false, false, 3_000);
        assert_eq!(monitor.warning(), BatteryWarning::None);
    }

    #[test]
    fn emergency_flag() {
        let mut monitor = BatteryMonitor::new();
        let result = monitor.update(BatteryWarning::Emergency, false, true, false, false, 1_000);
        assert!(result.escalated);
        assert!(result.emergency);
    }

    #[test]
    fn delayed_action_waits_for_delay() {
        let mut monitor = BatteryMonitor::new();
        monitor.update(BatteryWarning::Low, false, true, false, false, 1_000_000);
        assert!(monitor.in_action_delay());

        assert_eq!(
            monitor.take_delayed_action(LowBatteryAction::ReturnToLaunch, 5.0, true, 2_000_000),
            None
        );
        assert_eq!(
            monitor.take_delayed_action(LowBatteryAction::ReturnToLaunch, 5.0, true, 6_000_000),
            Some(MainState::AutoRtl)
        );
        assert!(!monitor.in_action_delay());

        // consumed: does not fire twice
        assert_eq!(
            monitor.take_delayed_action(LowBatteryAction::ReturnToLaunch, 5.0, true, 7_000_000),
            None
        );
    }

    #[test]
    fn remaining_time_fires_once_per_flight() {
        let mut monitor = BatteryMonitor::new();

        let result = monitor.update(BatteryWarning::None, true, true, false, false, 1_000);
        assert!(result.remaining_time_low);

        let result = monitor.update(BatteryWarning::None, true, true, false, false, 2_000);
        assert!(!result.remaining_time_low);

        // disarm resets the one-shot
        monitor.update(BatteryWarning::None, false, false, false, false, 3_000);
        let result = monitor.update(BatteryWarning::None, true, true, false, false, 4_000);
        assert!(result.remaining_time_low);
    }

    #[test]
    fn remaining_time_suppressed_during_landing() {
        let mut monitor = BatteryMonitor::new();
        let result = monitor.update(BatteryWarning::None, true, true, true, false, 1_000);
        assert!(!result.remaining_time_low);

        let result = monitor.update(BatteryWarning::None, true, true, false, true, 2_000);
        assert!(!result.remaining_time_low);
    }
}
