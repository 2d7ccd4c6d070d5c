//! Navigation-state resolver.
//!
//! Maps the operator-selected main state plus the current fault set onto
//! the effective navigation state the controllers obey. Termination always
//! wins; each loss action degrades through a fallback chain when the
//! estimates it needs are unavailable (RTL needs global position and home,
//! LAND needs a valid altitude, DESCEND is the last resort before
//! termination).
//!
//! Mode-change failsafes that are expressed as main-state transitions
//! (battery actions, geofence loiter/RTL/land, max flight time, high wind,
//! actuator failure) are applied by the commander loop before this
//! resolver runs; what remains here are the overlays that must never be
//! absorbed into the operator-visible main state.

use crate::status::{
    ActuatorArmed, CommanderState, MainState, NavState, StatusFlags, VehicleStatus,
};

/// Action on RC or GCS link loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkLossAction {
    Disabled,
    Hold,
    ReturnToLaunch,
    Land,
    Terminate,
    Lockdown,
}

impl LinkLossAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => LinkLossAction::Hold,
            2 => LinkLossAction::ReturnToLaunch,
            3 => LinkLossAction::Land,
            5 => LinkLossAction::Terminate,
            6 => LinkLossAction::Lockdown,
            _ => LinkLossAction::Disabled,
        }
    }
}

/// Action on offboard loss without RC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffboardLossAction {
    Land,
    Hold,
    ReturnToLaunch,
    Terminate,
}

impl OffboardLossAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => OffboardLossAction::Hold,
            2 => OffboardLossAction::ReturnToLaunch,
            3 => OffboardLossAction::Terminate,
            _ => OffboardLossAction::Land,
        }
    }
}

/// Action on offboard loss while RC is still available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffboardLossRcAction {
    Position,
    Altitude,
    Manual,
    ReturnToLaunch,
    Land,
    Hold,
}

impl OffboardLossRcAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => OffboardLossRcAction::Altitude,
            2 => OffboardLossRcAction::Manual,
            3 => OffboardLossRcAction::ReturnToLaunch,
            4 => OffboardLossRcAction::Land,
            5 => OffboardLossRcAction::Hold,
            _ => OffboardLossRcAction::Position,
        }
    }
}

/// VTOL quadchute action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QuadchuteAction {
    Warn,
    ReturnToLaunch,
    Land,
    Hold,
}

impl QuadchuteAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => QuadchuteAction::ReturnToLaunch,
            2 => QuadchuteAction::Land,
            3 => QuadchuteAction::Hold,
            _ => QuadchuteAction::Warn,
        }
    }
}

/// Action on battery warning escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowBatteryAction {
    Warning,
    ReturnToLaunch,
    Land,
    /// Return at LOW, land at CRITICAL.
    ReturnOrLand,
}

impl LowBatteryAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => LowBatteryAction::ReturnToLaunch,
            2 => LowBatteryAction::Land,
            3 => LowBatteryAction::ReturnOrLand,
            _ => LowBatteryAction::Warning,
        }
    }
}

/// Imbalanced-propeller advisory action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImbalancedPropAction {
    Warn,
    ReturnToLaunch,
    Land,
}

impl ImbalancedPropAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => ImbalancedPropAction::ReturnToLaunch,
            2 => ImbalancedPropAction::Land,
            _ => ImbalancedPropAction::Warn,
        }
    }
}

/// Motor/actuator failure action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorFailureAction {
    Warn,
    Hold,
    Land,
    ReturnToLaunch,
    Terminate,
}

impl ActuatorFailureAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => ActuatorFailureAction::Hold,
            2 => ActuatorFailureAction::Land,
            3 => ActuatorFailureAction::ReturnToLaunch,
            4 => ActuatorFailureAction::Terminate,
            _ => ActuatorFailureAction::Warn,
        }
    }
}

bitflags::bitflags! {
    /// Modes exempt from the RC-loss action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RclExceptMask: u8 {
        const MISSION = 1 << 0;
        const HOLD = 1 << 1;
        const OFFBOARD = 1 << 2;
    }
}

/// Why the resolver deviated from the main state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailsafeCause {
    None,
    FlightTermination,
    RcLoss,
    DataLinkLoss,
    OffboardLoss,
    Quadchute,
}

impl FailsafeCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailsafeCause::None => "",
            FailsafeCause::FlightTermination => "flight termination",
            FailsafeCause::RcLoss => "manual control loss",
            FailsafeCause::DataLinkLoss => "data link loss",
            FailsafeCause::OffboardLoss => "offboard control loss",
            FailsafeCause::Quadchute => "VTOL transition failure",
        }
    }

    /// Stable event id for downstream localisation.
    pub const fn event_id(self) -> &'static str {
        match self {
            FailsafeCause::None => "",
            FailsafeCause::FlightTermination => "commander_failsafe_termination",
            FailsafeCause::RcLoss => "commander_failsafe_rc_loss",
            FailsafeCause::DataLinkLoss => "commander_failsafe_dl_loss",
            FailsafeCause::OffboardLoss => "commander_failsafe_offboard_loss",
            FailsafeCause::Quadchute => "commander_failsafe_quadchute",
        }
    }
}

/// Resolver inputs beyond the status records.
#[derive(Debug, Clone)]
pub struct FailsafeConditions {
    pub landed: bool,
    /// The mission asked for flight termination (e.g. corrupt plan).
    pub mission_flight_termination: bool,
    pub data_link_loss_act: LinkLossAction,
    pub rc_loss_act: LinkLossAction,
    pub rcl_except: RclExceptMask,
    pub offboard_loss_act: OffboardLossAction,
    pub offboard_loss_rc_act: OffboardLossRcAction,
    pub quadchute_act: QuadchuteAction,
    /// CBRK_FLIGHTTERM engaged: mission-requested termination is ignored.
    pub flight_termination_disabled: bool,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavStateResult {
    pub changed: bool,
    pub cause: FailsafeCause,
}

/// Compute `status.nav_state` from the main state and the fault set.
///
/// Re-evaluated every tick; a decision that matches the current state is a
/// no-op (`changed == false`).
pub fn set_nav_state(
    status: &mut VehicleStatus,
    armed: &ActuatorArmed,
    internal: &CommanderState,
    flags: &StatusFlags,
    cond: &FailsafeConditions,
) -> NavStateResult {
    let old_nav_state = status.nav_state;
    let is_armed = armed.armed();
    // RC loss only matters when a manual control source was ever present;
    // a GCS-only flight is not in failsafe for lacking an RC link.
    let rc_lost = status.rc_signal_lost
        && flags.rc_signal_found_once
        && is_armed
        && !cond.landed;
    let data_link_lost = status.data_link_lost
        && is_armed
        && !cond.landed
        && cond.data_link_loss_act != LinkLossAction::Disabled;

    let mut cause = FailsafeCause::None;

    // Highest priority: irreversible termination.
    let terminate = armed.force_failsafe()
        || (cond.mission_flight_termination && !cond.flight_termination_disabled);

    let nav_state = if terminate {
        cause = FailsafeCause::FlightTermination;
        NavState::Termination
    } else {
        resolve_from_main_state(
            status, internal, flags, cond, rc_lost, data_link_lost, &mut cause,
        )
    };

    status.nav_state = nav_state;
    status.failsafe = cause != FailsafeCause::None;

    NavStateResult {
        changed: nav_state != old_nav_state,
        cause,
    }
}

fn resolve_from_main_state(
    status: &VehicleStatus,
    internal: &CommanderState,
    flags: &StatusFlags,
    cond: &FailsafeConditions,
    rc_lost: bool,
    data_link_lost: bool,
    cause: &mut FailsafeCause,
) -> NavState {
    let quadchute = status.is_vtol && flags.vtol_transition_failure;

    match internal.main_state {
        MainState::Manual | MainState::Stab | MainState::Acro => {
            if rc_lost {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                match internal.main_state {
                    MainState::Stab => NavState::Stab,
                    MainState::Acro => NavState::Acro,
                    _ => NavState::Manual,
                }
            }
        }

        MainState::Altctl => {
            if rc_lost {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                NavState::Altctl
            }
        }

        MainState::Posctl => {
            if rc_lost {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                NavState::Posctl
            }
        }

        MainState::AutoMission => {
            if quadchute {
                *cause = FailsafeCause::Quadchute;
                quadchute_nav_state(cond.quadchute_act, flags, NavState::AutoMission)
            } else if data_link_lost {
                *cause = FailsafeCause::DataLinkLoss;
                link_loss_nav_state(cond.data_link_loss_act, flags)
            } else if rc_lost
                && !cond.rcl_except.contains(RclExceptMask::MISSION)
                && cond.rc_loss_act != LinkLossAction::Disabled
            {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                NavState::AutoMission
            }
        }

        MainState::AutoLoiter => {
            if quadchute {
                *cause = FailsafeCause::Quadchute;
                quadchute_nav_state(cond.quadchute_act, flags, NavState::AutoLoiter)
            } else if data_link_lost {
                *cause = FailsafeCause::DataLinkLoss;
                link_loss_nav_state(cond.data_link_loss_act, flags)
            } else if rc_lost
                && !cond.rcl_except.contains(RclExceptMask::HOLD)
                && cond.rc_loss_act != LinkLossAction::Disabled
            {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                NavState::AutoLoiter
            }
        }

        MainState::AutoRtl => {
            if quadchute {
                *cause = FailsafeCause::Quadchute;
                quadchute_nav_state(cond.quadchute_act, flags, NavState::AutoRtl)
            } else {
                // Link loss cannot interrupt a return in progress.
                NavState::AutoRtl
            }
        }

        MainState::AutoTakeoff => {
            if quadchute {
                *cause = FailsafeCause::Quadchute;
                quadchute_nav_state(cond.quadchute_act, flags, NavState::AutoTakeoff)
            } else if rc_lost && cond.rc_loss_act != LinkLossAction::Disabled {
                *cause = FailsafeCause::RcLoss;
                link_loss_nav_state(cond.rc_loss_act, flags)
            } else {
                NavState::AutoTakeoff
            }
        }

        MainState::AutoVtolTakeoff => NavState::AutoVtolTakeoff,

        // Landing sequences run to completion regardless of link state.
        MainState::AutoLand => NavState::AutoLand,
        MainState::AutoPrecland => NavState::AutoPrecland,

        MainState::AutoFollowTarget => {
            if data_link_lost {
                *cause = FailsafeCause::DataLinkLoss;
                link_loss_nav_state(cond.data_link_loss_act, flags)
            } else {
                NavState::AutoFollowTarget
            }
        }

        MainState::Orbit => NavState::Orbit,

        MainState::Offboard => {
            if flags.offboard_control_signal_lost
                && !cond.rcl_except.contains(RclExceptMask::OFFBOARD)
            {
                *cause = FailsafeCause::OffboardLoss;
                if status.rc_signal_lost {
                    offboard_loss_nav_state(cond.offboard_loss_act, flags)
                } else {
                    offboard_loss_rc_nav_state(cond.offboard_loss_rc_act, flags)
                }
            } else {
                NavState::Offboard
            }
        }
    }
}

/// Degrade a link-loss action through its fallback chain.
fn link_loss_nav_state(action: LinkLossAction, flags: &StatusFlags) -> NavState {
    match action {
        LinkLossAction::Disabled | LinkLossAction::Hold => {
            if flags.global_position_valid {
                NavState::AutoLoiter
            } else {
                descend_or_land(flags)
            }
        }
        LinkLossAction::ReturnToLaunch => {
            if flags.global_position_valid && flags.home_position_valid {
                NavState::AutoRtl
            } else {
                descend_or_land(flags)
            }
        }
        LinkLossAction::Land => descend_or_land(flags),
        LinkLossAction::Terminate | LinkLossAction::Lockdown => NavState::Termination,
    }
}

fn descend_or_land(flags: &StatusFlags) -> NavState {
    if flags.local_altitude_valid {
        NavState::AutoLand
    } else {
        NavState::Descend
    }
}

fn offboard_loss_nav_state(action: OffboardLossAction, flags: &StatusFlags) -> NavState {
    match action {
        OffboardLossAction::Terminate => NavState::Termination,
        OffboardLossAction::Hold => {
            if flags.global_position_valid {
                NavState::AutoLoiter
            } else {
                descend_or_land(flags)
            }
        }
        OffboardLossAction::ReturnToLaunch => {
            if flags.global_position_valid && flags.home_position_valid {
                NavState::AutoRtl
            } else {
                descend_or_land(flags)
            }
        }
        OffboardLossAction::Land => descend_or_land(flags),
    }
}

fn offboard_loss_rc_nav_state(action: OffboardLossRcAction, flags: &StatusFlags) -> NavState {
    match action {
        OffboardLossRcAction::Manual => NavState::Manual,
        OffboardLossRcAction::Altitude => {
            if flags.local_altitude_valid {
                NavState::Altctl
            } else {
                NavState::Manual
            }
        }
        OffboardLossRcAction::Position => {
            if flags.local_position_valid {
                NavState::Posctl
            } else if flags.local_altitude_valid {
                NavState::Altctl
            } else {
                NavState::Manual
            }
        }
        OffboardLossRcAction::ReturnToLaunch => {
            if flags.global_position_valid && flags.home_position_valid {
                NavState::AutoRtl
            } else {
                descend_or_land(flags)
            }
        }
        OffboardLossRcAction::Land => descend_or_land(flags),
        OffboardLossRcAction::Hold => {
            if flags.global_position_valid {
                NavState::AutoLoiter
            } else {
                descend_or_land(flags)
            }
        }
    }
}

fn quadchute_nav_state(
    action: QuadchuteAction,
    flags: &StatusFlags,
    unchanged: NavState,
) -> NavState {
    match action {
        QuadchuteAction::Warn => unchanged,
        QuadchuteAction::ReturnToLaunch => {
            if flags.global_position_valid && flags.home_position_valid {
                NavState::AutoRtl
            } else {
                descend_or_land(flags)
            }
        }
        QuadchuteAction::Land => descend_or_land(flags),
        QuadchuteAction::Hold => {
            if flags.global_position_valid {
                NavState::AutoLoiter
            } else {
                descend_or_land(flags)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ActuatorArmedFlags, BatteryWarning};

    fn armed_status() -> VehicleStatus {
        VehicleStatus {
            arming_state: crate::status::ArmingState::Armed,
            rc_signal_lost: false,
            data_link_lost: false,
            ..Default::default()
        }
    }

    fn armed_record() -> ActuatorArmed {
        let mut armed = ActuatorArmed::default();
        armed.set(ActuatorArmedFlags::ARMED, true);
        armed
    }

    fn good_flags() -> StatusFlags {
        StatusFlags {
            global_position_valid: true,
            local_position_valid: true,
            local_altitude_valid: true,
            local_velocity_valid: true,
            home_position_valid: true,
            rc_signal_found_once: true,
            offboard_control_signal_lost: false,
            ..Default::default()
        }
    }

    fn default_conditions() -> FailsafeConditions {
        FailsafeConditions {
            landed: false,
            mission_flight_termination: false,
            data_link_loss_act: LinkLossAction::Disabled,
            rc_loss_act: LinkLossAction::ReturnToLaunch,
            rcl_except: RclExceptMask::empty(),
            offboard_loss_act: OffboardLossAction::Land,
            offboard_loss_rc_act: OffboardLossRcAction::Position,
            quadchute_act: QuadchuteAction::Warn,
            flight_termination_disabled: true,
        }
    }

    fn internal(main_state: MainState) -> CommanderState {
        CommanderState {
            main_state,
            main_state_changes: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn nominal_mapping_is_identity() {
        let mut status = armed_status();
        let result = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &good_flags(),
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::AutoMission);
        assert_eq!(result.cause, FailsafeCause::None);
        assert!(!status.failsafe);
    }

    #[test]
    fn force_failsafe_beats_everything() {
        // battery critical + RC loss + force_failsafe: termination wins
        let mut status = armed_status();
        status.rc_signal_lost = true;
        let mut armed = armed_record();
        armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, true);
        let mut flags = good_flags();
        flags.battery_warning = BatteryWarning::Critical;

        let result = set_nav_state(
            &mut status,
            &armed,
            &internal(MainState::AutoMission),
            &flags,
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::Termination);
        assert_eq!(result.cause, FailsafeCause::FlightTermination);
        assert!(status.failsafe);
    }

    #[test]
    fn mission_termination_respects_circuit_breaker() {
        let mut status = armed_status();
        let mut cond = default_conditions();
        cond.mission_flight_termination = true;

        // breaker engaged: no termination
        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoMission);

        cond.flight_termination_disabled = false;
        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::Termination);
    }

    #[test]
    fn rc_loss_in_manual_triggers_configured_action() {
        let mut status = armed_status();
        status.rc_signal_lost = true;

        let result = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &good_flags(),
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::AutoRtl);
        assert_eq!(result.cause, FailsafeCause::RcLoss);
    }

    #[test]
    fn rc_loss_fallback_chain() {
        let mut status = armed_status();
        status.rc_signal_lost = true;

        // no home: RTL degrades to LAND
        let mut flags = good_flags();
        flags.home_position_valid = false;
        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &flags,
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::AutoLand);

        // no altitude either: DESCEND
        flags.local_altitude_valid = false;
        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &flags,
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::Descend);
    }

    #[test]
    fn rc_loss_ignored_while_landed_or_disarmed() {
        let mut status = armed_status();
        status.rc_signal_lost = true;

        let mut cond = default_conditions();
        cond.landed = true;
        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::Manual);

        let disarmed = ActuatorArmed::default();
        set_nav_state(
            &mut status,
            &disarmed,
            &internal(MainState::Manual),
            &good_flags(),
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::Manual);
    }

    #[test]
    fn rc_loss_exception_mask_keeps_mission() {
        let mut status = armed_status();
        status.rc_signal_lost = true;
        let mut cond = default_conditions();
        cond.rcl_except = RclExceptMask::MISSION;

        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoMission);
        assert!(!status.failsafe);
    }

    #[test]
    fn data_link_loss_in_mission() {
        let mut status = armed_status();
        status.data_link_lost = true;
        let mut cond = default_conditions();
        cond.data_link_loss_act = LinkLossAction::ReturnToLaunch;

        let result = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoRtl);
        assert_eq!(result.cause, FailsafeCause::DataLinkLoss);
    }

    #[test]
    fn rtl_not_interrupted_by_link_loss() {
        let mut status = armed_status();
        status.rc_signal_lost = true;
        status.data_link_lost = true;
        let mut cond = default_conditions();
        cond.data_link_loss_act = LinkLossAction::Land;

        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoRtl),
            &good_flags(),
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoRtl);
    }

    #[test]
    fn offboard_loss_with_rc_falls_back_to_position() {
        let mut status = armed_status();
        let mut flags = good_flags();
        flags.offboard_control_signal_lost = true;

        let result = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Offboard),
            &flags,
            &default_conditions(),
        );
        assert_eq!(status.nav_state, NavState::Posctl);
        assert_eq!(result.cause, FailsafeCause::OffboardLoss);
    }

    #[test]
    fn offboard_loss_without_rc_uses_no_rc_action() {
        let mut status = armed_status();
        status.rc_signal_lost = true;
        let mut flags = good_flags();
        flags.offboard_control_signal_lost = true;
        let mut cond = default_conditions();
        cond.offboard_loss_act = OffboardLossAction::ReturnToLaunch;

        set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Offboard),
            &flags,
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoRtl);
    }

    #[test]
    fn quadchute_in_mission() {
        let mut status = armed_status();
        status.is_vtol = true;
        let mut flags = good_flags();
        flags.vtol_transition_failure = true;
        let mut cond = default_conditions();
        cond.quadchute_act = QuadchuteAction::Land;

        let result = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::AutoMission),
            &flags,
            &cond,
        );
        assert_eq!(status.nav_state, NavState::AutoLand);
        assert_eq!(result.cause, FailsafeCause::Quadchute);
    }

    #[test]
    fn repeated_resolution_is_a_noop() {
        let mut status = armed_status();
        status.rc_signal_lost = true;

        let first = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &good_flags(),
            &default_conditions(),
        );
        assert!(first.changed);

        let second = set_nav_state(
            &mut status,
            &armed_record(),
            &internal(MainState::Manual),
            &good_flags(),
            &default_conditions(),
        );
        assert!(!second.changed);
        assert_eq!(second.cause, FailsafeCause::RcLoss);
    }
}
