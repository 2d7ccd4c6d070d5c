//! Health and arming checks.
//!
//! Evaluates the sensor/link/battery preconditions and produces a pass/fail
//! mask over the candidate navigation states: `can_arm(nav_state)` answers
//! "could the vehicle (re)arm while this navigation state is active". The
//! commander re-evaluates before every publication and on every arming
//! attempt.

use crate::status::{BatteryWarning, NavState, StatusFlags, VehicleStatus};

/// Estimate requirements of one navigation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeRequirements {
    pub global_position: bool,
    pub local_position: bool,
    pub local_altitude: bool,
    pub home_position: bool,
    pub offboard_signal: bool,
    pub mission: bool,
}

impl ModeRequirements {
    /// Requirements table, one row per navigation state.
    pub fn for_nav_state(nav_state: NavState) -> Self {
        let mut req = ModeRequirements::default();
        match nav_state {
            NavState::Manual | NavState::Stab | NavState::Acro | NavState::Termination => {}
            NavState::Altctl | NavState::Descend => {
                req.local_altitude = true;
            }
            NavState::Posctl => {
                req.local_position = true;
            }
            NavState::AutoMission => {
                req.global_position = true;
                req.home_position = true;
                req.mission = true;
            }
            NavState::AutoLoiter | NavState::Orbit | NavState::AutoFollowTarget => {
                req.global_position = true;
            }
            NavState::AutoRtl => {
                req.global_position = true;
                req.home_position = true;
            }
            NavState::AutoTakeoff | NavState::AutoVtolTakeoff => {
                req.local_position = true;
                req.home_position = true;
            }
            NavState::AutoLand => {
                req.local_altitude = true;
            }
            NavState::AutoPrecland => {
                req.local_position = true;
            }
            NavState::Offboard => {
                req.offboard_signal = true;
            }
        }
        req
    }
}

const NAV_STATE_TABLE: [NavState; 17] = [
    NavState::Manual,
    NavState::Altctl,
    NavState::Posctl,
    NavState::AutoMission,
    NavState::AutoLoiter,
    NavState::AutoRtl,
    NavState::Acro,
    NavState::Offboard,
    NavState::Stab,
    NavState::AutoTakeoff,
    NavState::AutoLand,
    NavState::AutoFollowTarget,
    NavState::AutoPrecland,
    NavState::Orbit,
    NavState::AutoVtolTakeoff,
    NavState::Descend,
    NavState::Termination,
];

fn nav_state_bit(nav_state: NavState) -> u32 {
    let index = NAV_STATE_TABLE
        .iter()
        .position(|s| *s == nav_state)
        .unwrap_or(0);
    1 << index
}

/// Pass/fail mask over the candidate navigation states.
#[derive(Debug, Default)]
pub struct HealthAndArmingChecks {
    can_arm_mask: u32,
    failure_reason: Option<&'static str>,
}

impl HealthAndArmingChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate all checks against the current snapshots.
    pub fn update(&mut self, status: &VehicleStatus, flags: &StatusFlags) {
        self.failure_reason = None;
        self.can_arm_mask = 0;

        // Vehicle-level gates apply to every candidate state.
        if let Some(reason) = self.vehicle_level_failure(status, flags) {
            self.failure_reason = Some(reason);
            return;
        }

        for nav_state in NAV_STATE_TABLE {
            let req = ModeRequirements::for_nav_state(nav_state);
            let ok = (!req.global_position || flags.global_position_valid)
                && (!req.local_position || flags.local_position_valid)
                && (!req.local_altitude || flags.local_altitude_valid)
                && (!req.home_position || flags.home_position_valid)
                && (!req.offboard_signal || !flags.offboard_control_signal_lost)
                && (!req.mission || status.auto_mission_available);
            if ok {
                self.can_arm_mask |= nav_state_bit(nav_state);
            } else if self.failure_reason.is_none() && nav_state == status.nav_state {
                self.failure_reason = Some("estimate missing for current mode");
            }
        }
    }

    fn vehicle_level_failure(
        &self,
        status: &VehicleStatus,
        flags: &StatusFlags,
    ) -> Option<&'static str> {
        if flags.calibration_enabled {
            return Some("calibration in progress");
        }
        if flags.battery_warning >= BatteryWarning::Critical {
            return Some("battery level too low");
        }
        if status.usb_connected {
            return Some("flying with USB connected is not safe");
        }
        if !status.power_input_valid {
            return Some("no valid power source");
        }
        if status.safety_button_available && !status.safety_off {
            return Some("safety switch engaged");
        }
        None
    }

    /// True when arming would be allowed with this navigation state active.
    pub fn can_arm(&self, nav_state: NavState) -> bool {
        self.can_arm_mask & nav_state_bit(nav_state) != 0
    }

    /// First failing check of the last update, if any.
    pub fn failure_reason(&self) -> Option<&'static str> {
        self.failure_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_flags() -> StatusFlags {
        StatusFlags {
            gps_valid: true,
            global_position_valid: true,
            local_position_valid: true,
            local_altitude_valid: true,
            local_velocity_valid: true,
            home_position_valid: true,
            offboard_control_signal_lost: false,
            ..Default::default()
        }
    }

    #[test]
    fn all_estimates_valid_allows_everything() {
        let mut checks = HealthAndArmingChecks::new();
        let mut status = VehicleStatus::default();
        status.auto_mission_available = true;
        checks.update(&status, &good_flags());

        assert!(checks.can_arm(NavState::Manual));
        assert!(checks.can_arm(NavState::AutoMission));
        assert!(checks.can_arm(NavState::AutoTakeoff));
        assert!(checks.can_arm(NavState::Offboard));
    }

    #[test]
    fn manual_allowed_without_any_estimate() {
        let mut checks = HealthAndArmingChecks::new();
        checks.update(&VehicleStatus::default(), &StatusFlags::default());

        assert!(checks.can_arm(NavState::Manual));
        assert!(checks.can_arm(NavState::Stab));
        assert!(!checks.can_arm(NavState::Posctl));
        assert!(!checks.can_arm(NavState::AutoLoiter));
    }

    #[test]
    fn auto_modes_need_global_position_and_home() {
        let mut checks = HealthAndArmingChecks::new();
        let mut flags = good_flags();
        flags.home_position_valid = false;
        let mut status = VehicleStatus::default();
        status.auto_mission_available = true;
        checks.update(&status, &flags);

        assert!(checks.can_arm(NavState::AutoLoiter));
        assert!(!checks.can_arm(NavState::AutoRtl));
        assert!(!checks.can_arm(NavState::AutoMission));
        assert!(!checks.can_arm(NavState::AutoTakeoff));
    }

    #[test]
    fn mission_mode_needs_a_mission() {
        let mut checks = HealthAndArmingChecks::new();
        let status = VehicleStatus::default();
        checks.update(&status, &good_flags());
        assert!(!checks.can_arm(NavState::AutoMission));
    }

    #[test]
    fn critical_battery_blocks_all_arming() {
        let mut checks = HealthAndArmingChecks::new();
        let mut flags = good_flags();
        flags.battery_warning = BatteryWarning::Critical;
        checks.update(&VehicleStatus::default(), &flags);

        assert!(!checks.can_arm(NavState::Manual));
        assert_eq!(checks.failure_reason(), Some("battery level too low"));
    }

    #[test]
    fn usb_connection_blocks_arming() {
        let mut checks = HealthAndArmingChecks::new();
        let mut status = VehicleStatus::default();
        status.usb_connected = true;
        checks.update(&status, &good_flags());
        assert!(!checks.can_arm(NavState::Manual));
    }

    #[test]
    fn calibration_blocks_arming() {
        let mut checks = HealthAndArmingChecks::new();
        let mut flags = good_flags();
        flags.calibration_enabled = true;
        checks.update(&VehicleStatus::default(), &flags);
        assert!(!checks.can_arm(NavState::Manual));
    }
}
