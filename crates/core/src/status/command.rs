//! External command and operator action records.

/// Command ids understood by the supervisory core.
///
/// Values follow the MAVLink common command set so that a transport layer
/// can pass `COMMAND_LONG`/`COMMAND_INT` payloads through unchanged.
pub mod command_ids {
    pub const NAV_RETURN_TO_LAUNCH: u32 = 20;
    pub const NAV_LAND: u32 = 21;
    pub const NAV_TAKEOFF: u32 = 22;
    pub const NAV_PRECLAND: u32 = 23;
    pub const DO_ORBIT: u32 = 34;
    pub const SET_GPS_GLOBAL_ORIGIN: u32 = 48;
    pub const NAV_ROI: u32 = 80;
    pub const NAV_VTOL_TAKEOFF: u32 = 84;
    pub const DO_SET_MODE: u32 = 176;
    pub const DO_CHANGE_SPEED: u32 = 178;
    pub const DO_SET_HOME: u32 = 179;
    pub const DO_FLIGHTTERMINATION: u32 = 185;
    pub const DO_LAND_START: u32 = 189;
    pub const DO_GO_AROUND: u32 = 191;
    pub const DO_REPOSITION: u32 = 192;
    pub const DO_SET_ROI_LOCATION: u32 = 195;
    pub const DO_SET_ROI_WPNEXT_OFFSET: u32 = 196;
    pub const DO_SET_ROI_NONE: u32 = 197;
    pub const DO_SET_ROI: u32 = 201;
    pub const DO_PARACHUTE: u32 = 208;
    pub const PREFLIGHT_CALIBRATION: u32 = 241;
    pub const PREFLIGHT_STORAGE: u32 = 245;
    pub const PREFLIGHT_REBOOT_SHUTDOWN: u32 = 246;
    pub const MISSION_START: u32 = 300;
    pub const ACTUATOR_TEST: u32 = 310;
    pub const FIXED_MAG_CAL_YAW: u32 = 42006;
    pub const COMPONENT_ARM_DISARM: u32 = 400;
    pub const RUN_PREARM_CHECKS: u32 = 401;
    pub const START_RX_PAIR: u32 = 500;
    pub const CONTROL_HIGH_LATENCY: u32 = 2600;
    pub const DO_VTOL_TRANSITION: u32 = 3000;
}

/// param1 values for COMPONENT_ARM_DISARM.
pub const ARMING_ACTION_DISARM: i8 = 0;
pub const ARMING_ACTION_ARM: i8 = 1;

/// param2 sentinel that skips arming checks (MAV_CMD_COMPONENT_ARM_DISARM,
/// MAVLink spec: "21196: force arming/disarming").
pub const FORCE_ARMING_MAGIC: i32 = 21196;

/// param3 sentinel marking an arm request from onboard IO after an in-air
/// restart (MAVLink spec reserves this value for internal use).
pub const IN_AIR_RESTORE_MAGIC: i32 = 1234;

/// param1 value for DO_PARACHUTE requesting release.
pub const PARACHUTE_ACTION_RELEASE: f32 = 2.0;

/// A command addressed to the vehicle.
///
/// Five float parameters plus two doubles (`param5`/`param6`) so geodetic
/// coordinates survive the trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleCommand {
    pub command: u32,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f64,
    pub param6: f64,
    pub param7: f32,
    pub source_system: u8,
    pub source_component: u8,
    pub target_system: u8,
    pub target_component: u8,
    pub from_external: bool,
    pub timestamp: u64,
}

impl Default for VehicleCommand {
    fn default() -> Self {
        Self {
            command: 0,
            param1: f32::NAN,
            param2: f32::NAN,
            param3: f32::NAN,
            param4: f32::NAN,
            param5: f64::NAN,
            param6: f64::NAN,
            param7: f32::NAN,
            source_system: 0,
            source_component: 0,
            target_system: 0,
            target_component: 0,
            from_external: false,
            timestamp: 0,
        }
    }
}

impl VehicleCommand {
    /// Shorthand for an internally-generated command with default addressing.
    pub fn internal(command: u32) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    /// True if the command targets this system/component or is broadcast.
    pub fn targets(&self, system_id: u8, component_id: u8) -> bool {
        (self.target_system == system_id || self.target_system == 0)
            && (self.target_component == component_id || self.target_component == 0)
    }
}

/// Result code carried in a command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandResult {
    Accepted,
    TemporarilyRejected,
    Denied,
    Unsupported,
    Failed,
}

/// Acknowledgement published exactly once per handled command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandAck {
    pub command: u32,
    pub result: CommandResult,
    pub target_system: u8,
    pub target_component: u8,
    pub timestamp: u64,
}

/// Where an operator action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionRequestSource {
    RcStickGesture,
    RcSwitch,
    RcButton,
    RcModeSlot,
}

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionRequestAction {
    Arm,
    Disarm,
    ToggleArming,
    Kill,
    Unkill,
    SwitchMode,
}

/// Compact user-intent event from the RC decoding layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionRequest {
    pub source: ActionRequestSource,
    pub action: ActionRequestAction,
    /// Target mode for `SwitchMode`.
    pub mode: Option<crate::status::MainState>,
    pub timestamp: u64,
}
