//! Main (flight-mode) state machine.
//!
//! Transition requests name a target main state; acceptance depends on the
//! current estimates and the vehicle type. A denied transition leaves the
//! state untouched; the caller is responsible for the operator notification
//! (rate limited in the commander).

use crate::arming::TransitionResult;
use crate::status::{CommanderState, MainState, StatusFlags, VehicleStatus};

/// Request a main-state change.
///
/// Tie-break rule: a POSCTL request without a valid position estimate falls
/// back to ALTCTL when the altitude estimate is good, so a degraded vehicle
/// still gets the best assisted mode available.
pub fn main_state_transition(
    status: &VehicleStatus,
    new_main_state: MainState,
    flags: &StatusFlags,
    internal: &mut CommanderState,
) -> TransitionResult {
    let accepted_state = match new_main_state {
        MainState::Manual | MainState::Stab | MainState::Acro => Some(new_main_state),

        MainState::Altctl => flags.local_altitude_valid.then_some(MainState::Altctl),

        MainState::Posctl => {
            if flags.local_position_valid {
                Some(MainState::Posctl)
            } else if flags.local_altitude_valid {
                Some(MainState::Altctl)
            } else {
                None
            }
        }

        MainState::AutoMission => (flags.global_position_valid
            && status.auto_mission_available)
            .then_some(MainState::AutoMission),

        MainState::AutoLoiter | MainState::AutoFollowTarget | MainState::Orbit => {
            flags.global_position_valid.then_some(new_main_state)
        }

        MainState::AutoRtl => (flags.global_position_valid && flags.home_position_valid)
            .then_some(MainState::AutoRtl),

        MainState::AutoTakeoff => (!status.is_ground_vehicle()
            && flags.local_position_valid
            && flags.home_position_valid)
            .then_some(MainState::AutoTakeoff),

        MainState::AutoVtolTakeoff => (status.is_vtol
            && flags.local_position_valid
            && flags.home_position_valid)
            .then_some(MainState::AutoVtolTakeoff),

        MainState::AutoLand => (!status.is_ground_vehicle() && flags.local_altitude_valid)
            .then_some(MainState::AutoLand),

        MainState::AutoPrecland => (status.is_rotary_wing() && flags.local_position_valid)
            .then_some(MainState::AutoPrecland),

        MainState::Offboard => {
            (!flags.offboard_control_signal_lost).then_some(MainState::Offboard)
        }
    };

    match accepted_state {
        None => TransitionResult::Denied,
        Some(state) if state == internal.main_state => TransitionResult::NotChanged,
        Some(state) => {
            internal.main_state = state;
            internal.main_state_changes += 1;
            TransitionResult::Changed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::VehicleType;

    fn good_flags() -> StatusFlags {
        StatusFlags {
            global_position_valid: true,
            local_position_valid: true,
            local_altitude_valid: true,
            home_position_valid: true,
            offboard_control_signal_lost: false,
            ..Default::default()
        }
    }

    #[test]
    fn manual_always_allowed() {
        let status = VehicleStatus::default();
        let mut internal = CommanderState::default();
        internal.main_state = MainState::Posctl;

        let result =
            main_state_transition(&status, MainState::Manual, &StatusFlags::default(), &mut internal);
        assert_eq!(result, TransitionResult::Changed);
        assert_eq!(internal.main_state, MainState::Manual);
        assert_eq!(internal.main_state_changes, 1);
    }

    #[test]
    fn same_state_does_not_increment_counter() {
        let status = VehicleStatus::default();
        let mut internal = CommanderState::default();

        let result =
            main_state_transition(&status, MainState::Manual, &StatusFlags::default(), &mut internal);
        assert_eq!(result, TransitionResult::NotChanged);
        assert_eq!(internal.main_state_changes, 0);
    }

    #[test]
    fn posctl_falls_back_to_altctl() {
        let status = VehicleStatus::default();
        let mut flags = good_flags();
        flags.local_position_valid = false;
        let mut internal = CommanderState::default();

        let result = main_state_transition(&status, MainState::Posctl, &flags, &mut internal);
        assert_eq!(result, TransitionResult::Changed);
        assert_eq!(internal.main_state, MainState::Altctl);

        // no altitude either: denied, state untouched
        flags.local_altitude_valid = false;
        let result = main_state_transition(&status, MainState::Posctl, &flags, &mut internal);
        assert_eq!(result, TransitionResult::Denied);
        assert_eq!(internal.main_state, MainState::Altctl);
    }

    #[test]
    fn auto_modes_require_global_position() {
        let status = VehicleStatus::default();
        let mut flags = good_flags();
        flags.global_position_valid = false;
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::AutoLoiter, &flags, &mut internal),
            TransitionResult::Denied
        );
        assert_eq!(
            main_state_transition(&status, MainState::AutoRtl, &flags, &mut internal),
            TransitionResult::Denied
        );
    }

    #[test]
    fn rtl_requires_home() {
        let status = VehicleStatus::default();
        let mut flags = good_flags();
        flags.home_position_valid = false;
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::AutoRtl, &flags, &mut internal),
            TransitionResult::Denied
        );
    }

    #[test]
    fn mission_requires_uploaded_mission() {
        let mut status = VehicleStatus::default();
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::AutoMission, &good_flags(), &mut internal),
            TransitionResult::Denied
        );

        status.auto_mission_available = true;
        assert_eq!(
            main_state_transition(&status, MainState::AutoMission, &good_flags(), &mut internal),
            TransitionResult::Changed
        );
    }

    #[test]
    fn takeoff_gated_by_vehicle_type() {
        let mut status = VehicleStatus::default();
        status.vehicle_type = VehicleType::Rover;
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::AutoTakeoff, &good_flags(), &mut internal),
            TransitionResult::Denied
        );

        status.vehicle_type = VehicleType::RotaryWing;
        assert_eq!(
            main_state_transition(&status, MainState::AutoTakeoff, &good_flags(), &mut internal),
            TransitionResult::Changed
        );
    }

    #[test]
    fn vtol_takeoff_requires_vtol() {
        let mut status = VehicleStatus::default();
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::AutoVtolTakeoff, &good_flags(), &mut internal),
            TransitionResult::Denied
        );

        status.is_vtol = true;
        assert_eq!(
            main_state_transition(&status, MainState::AutoVtolTakeoff, &good_flags(), &mut internal),
            TransitionResult::Changed
        );
    }

    #[test]
    fn offboard_requires_signal() {
        let status = VehicleStatus::default();
        let mut flags = good_flags();
        flags.offboard_control_signal_lost = true;
        let mut internal = CommanderState::default();

        assert_eq!(
            main_state_transition(&status, MainState::Offboard, &flags, &mut internal),
            TransitionResult::Denied
        );
    }

    #[test]
    fn counter_is_monotonic_across_changes() {
        let status = VehicleStatus::default();
        let mut internal = CommanderState::default();
        let flags = good_flags();

        main_state_transition(&status, MainState::Posctl, &flags, &mut internal);
        main_state_transition(&status, MainState::AutoLoiter, &flags, &mut internal);
        main_state_transition(&status, MainState::Manual, &flags, &mut internal);
        assert_eq!(internal.main_state_changes, 3);
    }
}
