//! Vehicle control-mode derivation.
//!
//! The control-mode flags tell the downstream controllers which cascades
//! are active. They are a pure function of the navigation state and the
//! armed flag, recomputed before every publication.

use crate::status::{NavState, VehicleControlMode};

/// Derive the control-mode flags for a navigation state.
pub fn control_mode_for_nav_state(
    nav_state: NavState,
    armed: bool,
    timestamp: u64,
) -> VehicleControlMode {
    let mut mode = VehicleControlMode {
        flag_armed: armed,
        timestamp,
        ..Default::default()
    };

    match nav_state {
        NavState::Manual => {
            mode.flag_control_manual_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
        }
        NavState::Stab => {
            mode.flag_control_manual_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
        }
        NavState::Acro => {
            mode.flag_control_manual_enabled = true;
            mode.flag_control_rates_enabled = true;
        }
        NavState::Altctl => {
            mode.flag_control_manual_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
            mode.flag_control_altitude_enabled = true;
            mode.flag_control_climb_rate_enabled = true;
        }
        NavState::Posctl => {
            mode.flag_control_manual_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
            mode.flag_control_altitude_enabled = true;
            mode.flag_control_climb_rate_enabled = true;
            mode.flag_control_position_enabled = true;
            mode.flag_control_velocity_enabled = true;
        }
        NavState::AutoMission
        | NavState::AutoLoiter
        | NavState::AutoRtl
        | NavState::AutoTakeoff
        | NavState::AutoVtolTakeoff
        | NavState::AutoLand
        | NavState::AutoPrecland
        | NavState::AutoFollowTarget
        | NavState::Orbit => {
            mode.flag_control_auto_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
            mode.flag_control_altitude_enabled = true;
            mode.flag_control_climb_rate_enabled = true;
            mode.flag_control_position_enabled = true;
            mode.flag_control_velocity_enabled = true;
        }
        NavState::Descend => {
            // fixed-rate descent without position hold
            mode.flag_control_auto_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
            mode.flag_control_climb_rate_enabled = true;
        }
        NavState::Offboard => {
            mode.flag_control_offboard_enabled = true;
            mode.flag_control_rates_enabled = true;
            mode.flag_control_attitude_enabled = true;
            mode.flag_control_altitude_enabled = true;
            mode.flag_control_climb_rate_enabled = true;
            mode.flag_control_position_enabled = true;
            mode.flag_control_velocity_enabled = true;
        }
        NavState::Termination => {
            mode.flag_control_termination_enabled = true;
        }
    }

    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_has_no_autonomy_flags() {
        let mode = control_mode_for_nav_state(NavState::Manual, true, 0);
        assert!(mode.flag_armed);
        assert!(mode.flag_control_manual_enabled);
        assert!(!mode.flag_control_auto_enabled);
        assert!(!mode.flag_control_position_enabled);
        assert!(!mode.flag_control_climb_rate_enabled);
    }

    #[test]
    fn altctl_enables_climb_rate() {
        let mode = control_mode_for_nav_state(NavState::Altctl, true, 0);
        assert!(mode.flag_control_manual_enabled);
        assert!(mode.flag_control_climb_rate_enabled);
        assert!(!mode.flag_control_position_enabled);
    }

    #[test]
    fn auto_modes_enable_position_cascade() {
        for nav in [NavState::AutoMission, NavState::AutoRtl, NavState::AutoLoiter] {
            let mode = control_mode_for_nav_state(nav, true, 0);
            assert!(mode.flag_control_auto_enabled);
            assert!(mode.flag_control_position_enabled);
            assert!(!mode.flag_control_manual_enabled);
        }
    }

    #[test]
    fn termination_sets_only_termination() {
        let mode = control_mode_for_nav_state(NavState::Termination, true, 0);
        assert!(mode.flag_control_termination_enabled);
        assert!(!mode.flag_control_rates_enabled);
        assert!(!mode.flag_control_auto_enabled);
    }

    #[test]
    fn offboard_flag() {
        let mode = control_mode_for_nav_state(NavState::Offboard, true, 0);
        assert!(mode.flag_control_offboard_enabled);
        assert!(!mode.flag_control_manual_enabled);
        assert!(!mode.flag_control_auto_enabled);
    }
}
