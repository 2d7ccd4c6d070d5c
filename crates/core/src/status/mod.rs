//! Vehicle status value objects and public enums.
//!
//! These are the records exchanged over the topic bus between the
//! commander, the navigator and the external collaborators (estimators,
//! controllers, transport). All records are plain `Copy`/`Clone` data with
//! no behavior beyond small accessors; ownership rules are enforced by the
//! tasks, not the types.

mod command;
mod io;
mod setpoint;
mod ui;

pub use command::{
    command_ids, ActionRequest, ActionRequestAction, ActionRequestSource, CommandAck,
    CommandResult, VehicleCommand, ARMING_ACTION_ARM, ARMING_ACTION_DISARM,
    FORCE_ARMING_MAGIC, IN_AIR_RESTORE_MAGIC, PARACHUTE_ACTION_RELEASE,
};
pub use io::{
    BatteryStatus, CpuLoad, GlobalPosition, GpsFix, GpsPosition, IridiumStatus, LandDetected,
    LinkType, LocalPosition, ManualControlSetpoint, ManualControlSource, OffboardControlMode,
    PositionControllerLandingStatus, PositionControllerStatus, PowerButtonEvent, RoiMode, Safety,
    SystemPower, TelemetryStatus, TransponderReport, VehicleRoi, VtolState, VtolVehicleStatus,
    Wind,
};
pub use setpoint::{PositionSetpoint, PositionSetpointTriplet, SetpointType};
pub use ui::{LedColor, LedControl, LedMode, TuneControl, TuneId};

/// Arm lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmingState {
    /// Boot/calibration; motors disabled.
    Init,
    /// Disarmed and passing required checks.
    Standby,
    /// Motors enabled.
    Armed,
    /// Disarmed, a fatal problem blocks arming.
    StandbyError,
    /// Terminal.
    Shutdown,
    /// Transient state for an onboard system restarting mid-flight.
    InAirRestore,
}

/// Operator/automation-requested flight mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MainState {
    Manual,
    Altctl,
    Posctl,
    AutoMission,
    AutoLoiter,
    AutoRtl,
    Acro,
    Offboard,
    Stab,
    AutoTakeoff,
    AutoLand,
    AutoFollowTarget,
    AutoPrecland,
    Orbit,
    AutoVtolTakeoff,
}

impl MainState {
    /// Display name used in operator-facing messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            MainState::Manual => "Manual",
            MainState::Altctl => "Altitude",
            MainState::Posctl => "Position",
            MainState::AutoMission => "Mission",
            MainState::AutoLoiter => "Hold",
            MainState::AutoRtl => "RTL",
            MainState::Acro => "Acro",
            MainState::Offboard => "Offboard",
            MainState::Stab => "Stabilized",
            MainState::AutoTakeoff => "Takeoff",
            MainState::AutoLand => "Land",
            MainState::AutoFollowTarget => "Follow target",
            MainState::AutoPrecland => "Precision land",
            MainState::Orbit => "Orbit",
            MainState::AutoVtolTakeoff => "VTOL Takeoff",
        }
    }
}

/// Effective mode after failsafe resolution; what the controllers obey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavState {
    Manual,
    Altctl,
    Posctl,
    AutoMission,
    AutoLoiter,
    AutoRtl,
    Acro,
    Offboard,
    Stab,
    AutoTakeoff,
    AutoLand,
    AutoFollowTarget,
    AutoPrecland,
    Orbit,
    AutoVtolTakeoff,
    /// Controlled descent without position hold (RC loss last resort).
    Descend,
    /// Irreversible failure outputs engaged.
    Termination,
}

impl NavState {
    /// True for the states the navigator serves with a mode object.
    pub const fn is_autonomous(self) -> bool {
        matches!(
            self,
            NavState::AutoMission
                | NavState::AutoLoiter
                | NavState::AutoRtl
                | NavState::AutoTakeoff
                | NavState::AutoVtolTakeoff
                | NavState::AutoLand
                | NavState::AutoPrecland
        )
    }
}

/// Airframe class the supervisory rules are gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VehicleType {
    Unknown,
    RotaryWing,
    FixedWing,
    Rover,
}

/// Battery charge warning level, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryWarning {
    #[default]
    None,
    Low,
    Critical,
    Emergency,
}

/// Who asked for an arm/disarm transition. Carried in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmDisarmReason {
    TransitionToStandby,
    RcStick,
    RcSwitch,
    RcButton,
    CommandInternal,
    CommandExternal,
    MissionStart,
    AutoDisarmLand,
    AutoDisarmPreflight,
    KillSwitch,
    Lockdown,
    FailureDetector,
    Shutdown,
}

impl ArmDisarmReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ArmDisarmReason::TransitionToStandby => "",
            ArmDisarmReason::RcStick => "RC",
            ArmDisarmReason::RcSwitch => "RC (switch)",
            ArmDisarmReason::RcButton => "RC (button)",
            ArmDisarmReason::CommandInternal => "internal command",
            ArmDisarmReason::CommandExternal => "external command",
            ArmDisarmReason::MissionStart => "mission start",
            ArmDisarmReason::AutoDisarmLand => "landing",
            ArmDisarmReason::AutoDisarmPreflight => "auto preflight disarming",
            ArmDisarmReason::KillSwitch => "kill-switch",
            ArmDisarmReason::Lockdown => "lockdown",
            ArmDisarmReason::FailureDetector => "failure detector",
            ArmDisarmReason::Shutdown => "shutdown request",
        }
    }

    /// True for requests originating from the RC link.
    pub const fn is_rc(self) -> bool {
        matches!(
            self,
            ArmDisarmReason::RcStick | ArmDisarmReason::RcSwitch | ArmDisarmReason::RcButton
        )
    }
}

bitflags::bitflags! {
    /// Motor-enable output bits. Equality of two snapshots is structural.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActuatorArmedFlags: u8 {
        /// Motors enabled.
        const ARMED = 1 << 0;
        /// Prearm stage passed; actuators other than motors may move.
        const PREARMED = 1 << 1;
        /// All checks pass, arming would succeed.
        const READY_TO_ARM = 1 << 2;
        /// Motors off, recoverable by command.
        const LOCKDOWN = 1 << 3;
        /// Kill switch engaged.
        const MANUAL_LOCKDOWN = 1 << 4;
        /// Non-recoverable termination. Monotone once set within a flight.
        const FORCE_FAILSAFE = 1 << 5;
        /// ESC calibration pass-through active.
        const IN_ESC_CALIBRATION_MODE = 1 << 6;
    }
}

/// Published motor-enable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorArmed {
    pub flags: ActuatorArmedFlags,
    pub timestamp: u64,
}

impl ActuatorArmed {
    pub fn armed(&self) -> bool {
        self.flags.contains(ActuatorArmedFlags::ARMED)
    }

    pub fn lockdown(&self) -> bool {
        self.flags.contains(ActuatorArmedFlags::LOCKDOWN)
    }

    pub fn manual_lockdown(&self) -> bool {
        self.flags.contains(ActuatorArmedFlags::MANUAL_LOCKDOWN)
    }

    pub fn force_failsafe(&self) -> bool {
        self.flags.contains(ActuatorArmedFlags::FORCE_FAILSAFE)
    }

    pub fn set(&mut self, flag: ActuatorArmedFlags, value: bool) {
        self.flags.set(flag, value);
    }

    /// Structural equality ignoring the publication timestamp.
    pub fn same_state(&self, other: &ActuatorArmed) -> bool {
        self.flags == other.flags
    }
}

/// Commander-internal state published for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommanderState {
    pub main_state: MainState,
    /// Monotonic count of accepted main-state changes since boot.
    pub main_state_changes: u32,
    pub timestamp: u64,
}

impl Default for CommanderState {
    fn default() -> Self {
        Self {
            main_state: MainState::Manual,
            main_state_changes: 0,
            timestamp: 0,
        }
    }
}

/// Pre-flight and runtime pass/fail flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusFlags {
    pub gps_valid: bool,
    pub global_position_valid: bool,
    pub local_position_valid: bool,
    pub local_altitude_valid: bool,
    pub local_velocity_valid: bool,
    pub home_position_valid: bool,
    pub battery_warning: BatteryWarning,
    /// Estimated remaining flight time no longer covers a return.
    pub battery_low_remaining_time: bool,
    pub pre_flight_checks_pass: bool,
    pub calibration_enabled: bool,
    pub rc_calibration_in_progress: bool,
    pub rc_signal_found_once: bool,
    pub offboard_control_signal_lost: bool,
    pub vtol_transition_failure: bool,
    pub timestamp: u64,
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self {
            gps_valid: false,
            global_position_valid: false,
            local_position_valid: false,
            local_altitude_valid: false,
            local_velocity_valid: false,
            home_position_valid: false,
            battery_warning: BatteryWarning::None,
            battery_low_remaining_time: false,
            pre_flight_checks_pass: false,
            calibration_enabled: false,
            rc_calibration_in_progress: false,
            rc_signal_found_once: false,
            offboard_control_signal_lost: true,
            vtol_transition_failure: false,
            timestamp: 0,
        }
    }
}

/// Supervisory status record.
///
/// Invariant: `arming_state == Armed` implies the last successful health
/// check covered the current navigation state, unless a forced arm was used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleStatus {
    pub system_id: u8,
    pub component_id: u8,
    pub vehicle_type: VehicleType,
    pub is_vtol: bool,
    pub arming_state: ArmingState,
    pub nav_state: NavState,
    pub nav_state_timestamp: u64,
    pub failsafe: bool,
    pub rc_signal_lost: bool,
    pub data_link_lost: bool,
    pub data_link_lost_counter: u8,
    pub high_latency_data_link_lost: bool,
    pub usb_connected: bool,
    pub in_transition_mode: bool,
    pub in_transition_to_fw: bool,
    pub geofence_violated: bool,
    pub auto_mission_available: bool,
    pub power_input_valid: bool,
    pub safety_button_available: bool,
    pub safety_off: bool,
    pub boot_timestamp: u64,
    pub armed_time: u64,
    pub takeoff_time: u64,
    pub timestamp: u64,
}

impl Default for VehicleStatus {
    fn default() -> Self {
        Self {
            system_id: 1,
            component_id: 1,
            vehicle_type: VehicleType::RotaryWing,
            is_vtol: false,
            arming_state: ArmingState::Init,
            nav_state: NavState::Manual,
            nav_state_timestamp: 0,
            failsafe: false,
            rc_signal_lost: true,
            data_link_lost: true,
            data_link_lost_counter: 0,
            high_latency_data_link_lost: false,
            usb_connected: false,
            in_transition_mode: false,
            in_transition_to_fw: false,
            geofence_violated: false,
            auto_mission_available: false,
            power_input_valid: true,
            safety_button_available: false,
            safety_off: true,
            boot_timestamp: 0,
            armed_time: 0,
            takeoff_time: 0,
            timestamp: 0,
        }
    }
}

impl VehicleStatus {
    pub fn is_rotary_wing(&self) -> bool {
        self.vehicle_type == VehicleType::RotaryWing
    }

    pub fn is_fixed_wing(&self) -> bool {
        self.vehicle_type == VehicleType::FixedWing
    }

    pub fn is_ground_vehicle(&self) -> bool {
        self.vehicle_type == VehicleType::Rover
    }
}

/// Derived control-mode flags consumed by the downstream controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VehicleControlMode {
    pub flag_armed: bool,
    pub flag_control_manual_enabled: bool,
    pub flag_control_auto_enabled: bool,
    pub flag_control_offboard_enabled: bool,
    pub flag_control_rates_enabled: bool,
    pub flag_control_attitude_enabled: bool,
    pub flag_control_altitude_enabled: bool,
    pub flag_control_climb_rate_enabled: bool,
    pub flag_control_position_enabled: bool,
    pub flag_control_velocity_enabled: bool,
    pub flag_control_termination_enabled: bool,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_armed_structural_equality() {
        let mut a = ActuatorArmed::default();
        let mut b = ActuatorArmed::default();
        b.timestamp = 42;
        assert!(a.same_state(&b));

        a.set(ActuatorArmedFlags::LOCKDOWN, true);
        assert!(!a.same_state(&b));
        a.set(ActuatorArmedFlags::LOCKDOWN, false);
        assert!(a.same_state(&b));
    }

    #[test]
    fn battery_warning_is_ordered() {
        assert!(BatteryWarning::Emergency > BatteryWarning::Critical);
        assert!(BatteryWarning::Critical > BatteryWarning::Low);
        assert!(BatteryWarning::Low > BatteryWarning::None);
    }

    #[test]
    fn nav_state_autonomy() {
        assert!(NavState::AutoLoiter.is_autonomous());
        assert!(NavState::AutoRtl.is_autonomous());
        assert!(!NavState::Manual.is_autonomous());
        assert!(!NavState::Termination.is_autonomous());
        assert!(!NavState::Offboard.is_autonomous());
    }

    #[test]
    fn arm_disarm_reason_sources() {
        assert!(ArmDisarmReason::RcSwitch.is_rc());
        assert!(ArmDisarmReason::RcStick.is_rc());
        assert!(!ArmDisarmReason::CommandExternal.is_rc());
        assert_eq!(ArmDisarmReason::KillSwitch.as_str(), "kill-switch");
    }
}
