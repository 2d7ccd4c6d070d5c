//! The full topic set wired by the composition root.
//!
//! A single `Topics` value is owned by the top level (SITL harness or
//! firmware main); the commander and navigator borrow it and create their
//! own subscriptions. No topic is reachable through a global.

use crate::bus::{QueuedTopic, Topic};
use crate::events::Event;
use crate::failure_detector::{FailureDetectorInput, FailureDetectorStatus};
use crate::geofence::GeofenceResult;
use crate::home::HomePosition;
use crate::mission::{MissionPlan, MissionResult};
use crate::params::ParameterUpdate;
use crate::status::{
    ActionRequest, ActuatorArmed, BatteryStatus, CommandAck, CommanderState, CpuLoad,
    GlobalPosition, GpsPosition, IridiumStatus, LandDetected, LedControl, LocalPosition,
    ManualControlSetpoint, OffboardControlMode, PositionControllerLandingStatus,
    PositionControllerStatus, PositionSetpointTriplet, Safety, StatusFlags, SystemPower,
    TelemetryStatus, TransponderReport, TuneControl, VehicleCommand, VehicleControlMode,
    VehicleRoi, VehicleStatus, VtolVehicleStatus, Wind,
};

/// All topics exchanged between the supervisory tasks and their
/// collaborators.
pub struct Topics {
    /// Bus-wide publication order counter, see [`Topics::next_order`].
    order: core::cell::Cell<u64>,

    // Commands and operator intent. `vehicle_command` is also a publication
    // target for the core itself (parachute release, mission start) and has
    // two consumers (commander, navigator), so it is a generational topic:
    // each consumer takes at most one command per tick and logs missed
    // generations.
    pub vehicle_command: Topic<VehicleCommand>,
    pub vehicle_command_ack: QueuedTopic<CommandAck, 8>,
    pub action_request: QueuedTopic<ActionRequest, 4>,

    // External inputs.
    pub land_detected: Topic<LandDetected>,
    pub manual_control_setpoint: Topic<ManualControlSetpoint>,
    pub telemetry_status: QueuedTopic<TelemetryStatus, 4>,
    pub iridium_status: Topic<IridiumStatus>,
    pub offboard_control_mode: Topic<OffboardControlMode>,
    pub vtol_vehicle_status: Topic<VtolVehicleStatus>,
    pub wind: Topic<Wind>,
    pub battery_status: Topic<BatteryStatus>,
    pub cpu_load: Topic<CpuLoad>,
    pub system_power: Topic<SystemPower>,
    pub safety: Topic<Safety>,
    pub parameter_update: Topic<ParameterUpdate>,
    pub local_position: Topic<LocalPosition>,
    pub global_position: Topic<GlobalPosition>,
    pub gps_position: Topic<GpsPosition>,
    pub position_controller_status: Topic<PositionControllerStatus>,
    pub position_controller_landing_status: Topic<PositionControllerLandingStatus>,
    pub transponder_report: QueuedTopic<TransponderReport, 8>,
    pub mission_plan: Topic<MissionPlan>,
    /// Aggregated raw inputs for the failure detector (attitude, ESC
    /// telemetry, imbalance metric), published by the sensor layer.
    pub failure_detector_input: Topic<FailureDetectorInput>,

    // Supervisory outputs.
    pub vehicle_status: Topic<VehicleStatus>,
    pub vehicle_status_flags: Topic<StatusFlags>,
    pub actuator_armed: Topic<ActuatorArmed>,
    pub vehicle_control_mode: Topic<VehicleControlMode>,
    pub commander_state: Topic<CommanderState>,
    pub failure_detector_status: Topic<FailureDetectorStatus>,
    pub home_position: Topic<HomePosition>,
    pub geofence_result: Topic<GeofenceResult>,
    pub mission_result: Topic<MissionResult>,
    pub position_setpoint_triplet: Topic<PositionSetpointTriplet>,
    pub vehicle_roi: Topic<VehicleRoi>,
    pub led_control: Topic<LedControl>,
    pub tune_control: Topic<TuneControl>,
    pub event: QueuedTopic<Event, 32>,
}

impl Topics {
    pub const fn new() -> Self {
        Self {
            order: core::cell::Cell::new(0),
            vehicle_command: Topic::new(),
            vehicle_command_ack: QueuedTopic::new(),
            action_request: QueuedTopic::new(),
            land_detected: Topic::new(),
            manual_control_setpoint: Topic::new(),
            telemetry_status: QueuedTopic::new(),
            iridium_status: Topic::new(),
            offboard_control_mode: Topic::new(),
            vtol_vehicle_status: Topic::new(),
            wind: Topic::new(),
            battery_status: Topic::new(),
            cpu_load: Topic::new(),
            system_power: Topic::new(),
            safety: Topic::new(),
            parameter_update: Topic::new(),
            local_position: Topic::new(),
            global_position: Topic::new(),
            gps_position: Topic::new(),
            position_controller_status: Topic::new(),
            position_controller_landing_status: Topic::new(),
            transponder_report: QueuedTopic::new(),
            mission_plan: Topic::new(),
            failure_detector_input: Topic::new(),
            vehicle_status: Topic::new(),
            vehicle_status_flags: Topic::new(),
            actuator_armed: Topic::new(),
            vehicle_control_mode: Topic::new(),
            commander_state: Topic::new(),
            failure_detector_status: Topic::new(),
            home_position: Topic::new(),
            geofence_result: Topic::new(),
            mission_result: Topic::new(),
            position_setpoint_triplet: Topic::new(),
            vehicle_roi: Topic::new(),
            led_control: Topic::new(),
            tune_control: Topic::new(),
            event: QueuedTopic::new(),
        }
    }

    /// Next bus-wide publication ordering stamp (strictly increasing).
    pub fn next_order(&self) -> u64 {
        let order = self.order.get() + 1;
        self.order.set(order);
        order
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new()
    }
}
