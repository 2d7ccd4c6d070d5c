//! Composition root and scenario harness.
//!
//! Owns the topic bus, the parameter store, the power-button queue and the
//! fence library, wires the commander and navigator into them, and closes
//! the loop with the vehicle model. Everything advances in lockstep
//! through [`SimVehicle::step`].

use std::cell::RefCell;

use heapless::spsc::{Producer, Queue};

use strato_core::bus::Topics;
use strato_core::commander::{Commander, COMMANDER_MONITORING_INTERVAL_US};
use strato_core::events::Event;
use strato_core::geofence::FenceContainment;
use strato_core::mission::{MissionItem, MissionPlan};
use strato_core::navigator::Navigator;
use strato_core::params::{ParameterStore, ParameterUpdate, ParamValue};
use strato_core::traits::TimeSource;
use strato_core::status::command_ids;
use strato_core::status::{
    ActionRequest, ActionRequestAction, ActionRequestSource, BatteryStatus, BatteryWarning,
    CommandAck, GlobalPosition, GpsFix, GpsPosition, LandDetected, LocalPosition, MainState,
    ManualControlSetpoint, ManualControlSource, PowerButtonEvent, TelemetryStatus,
    VehicleCommand, Wind,
};

use crate::fence::SimpleFence;
use crate::model::VehicleModel;
use crate::time::SimClock;

/// Simulation step, locked to the commander monitoring interval.
pub const SIM_STEP_US: u64 = COMMANDER_MONITORING_INTERVAL_US;

/// Default spawn point.
pub const HOME_LAT: f64 = 47.397;
pub const HOME_LON: f64 = 8.545;
pub const GROUND_ALT: f32 = 488.0;

/// What the simulated sensor layer feeds into the bus each step.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub gps_ok: bool,
    pub rc_valid: bool,
    pub rc_source: ManualControlSource,
    /// Throttle stick position, [0, 1].
    pub rc_throttle: f32,
    pub sticks_moving: bool,
    pub gcs_heartbeat: bool,
    pub battery_warning: BatteryWarning,
    pub battery_low_remaining: bool,
    pub wind_north: f32,
    pub wind_east: f32,
    /// Overrides the model's landed flag when set.
    pub land_override: Option<bool>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            gps_ok: true,
            rc_valid: false,
            rc_source: ManualControlSource::Rc,
            rc_throttle: 0.0,
            sticks_moving: false,
            gcs_heartbeat: true,
            battery_warning: BatteryWarning::None,
            battery_low_remaining: false,
            wind_north: 0.0,
            wind_east: 0.0,
            land_override: None,
        }
    }
}

/// One simulated vehicle with its supervisory tasks.
pub struct SimVehicle {
    pub clock: SimClock,
    pub topics: &'static Topics,
    pub store: &'static RefCell<ParameterStore>,
    pub commander: Commander<'static, SimClock>,
    pub navigator: Navigator<'static, SimClock>,
    pub model: VehicleModel,
    pub sensors: SensorConfig,
    power_button: Producer<'static, PowerButtonEvent>,
}

impl SimVehicle {
    pub fn new() -> Self {
        Self::with_fence(SimpleFence::new())
    }

    /// Build a vehicle with a fence library instance.
    ///
    /// The composition pieces are leaked to `'static`; each `SimVehicle`
    /// is a whole simulated system and lives for the process.
    pub fn with_fence(fence: SimpleFence) -> Self {
        let clock = SimClock::new();
        let topics: &'static Topics = Box::leak(Box::new(Topics::new()));
        let store: &'static RefCell<ParameterStore> =
            Box::leak(Box::new(RefCell::new(ParameterStore::new())));
        let fence: &'static SimpleFence = Box::leak(Box::new(fence));
        let queue: &'static mut Queue<PowerButtonEvent, 4> = Box::leak(Box::new(Queue::new()));
        let (producer, consumer) = queue.split();

        let commander = Commander::new(clock.clone(), topics, store, consumer, 161);
        let navigator = Navigator::new(
            clock.clone(),
            topics,
            store,
            fence as &'static dyn FenceContainment,
        );

        Self {
            clock,
            topics,
            store,
            commander,
            navigator,
            model: VehicleModel::new(HOME_LAT, HOME_LON, GROUND_ALT),
            sensors: SensorConfig::default(),
            power_button: producer,
        }
    }

    /// Advance the whole system by one step.
    pub fn step(&mut self) {
        self.clock.advance(SIM_STEP_US);
        let now = self.clock.now_us();

        self.publish_sensors(now);
        self.commander.tick();
        self.navigator.tick();

        let triplet = self
            .topics
            .position_setpoint_triplet
            .read()
            .unwrap_or_default();
        self.model.step(
            &triplet,
            self.commander.is_armed(),
            SIM_STEP_US as f32 / 1e6,
        );
    }

    /// Advance the simulation by wall-clock milliseconds.
    pub fn run_ms(&mut self, ms: u64) {
        for _ in 0..(ms * 1000 / SIM_STEP_US) {
            self.step();
        }
    }

    /// Boot sequence: run past the in-air-restart holdoff so home may be
    /// set and the arm machine settles in STANDBY.
    pub fn boot(&mut self) {
        self.run_ms(700);
    }

    fn publish_sensors(&mut self, now: u64) {
        let landed = self.sensors.land_override.unwrap_or(self.model.landed);

        self.topics.global_position.publish(GlobalPosition {
            lat: self.model.lat,
            lon: self.model.lon,
            alt: self.model.alt,
            valid: self.sensors.gps_ok,
            timestamp: now,
        });
        self.topics.local_position.publish(LocalPosition {
            x: 0.0,
            y: 0.0,
            z: -(self.model.alt - GROUND_ALT),
            vx: self.model.vn,
            vy: self.model.ve,
            vz: self.model.vz,
            heading: self.model.heading,
            xy_valid: self.sensors.gps_ok,
            z_valid: true,
            v_xy_valid: self.sensors.gps_ok,
            v_z_valid: true,
            timestamp: now,
        });
        self.topics.gps_position.publish(GpsPosition {
            lat: self.model.lat,
            lon: self.model.lon,
            alt: self.model.alt,
            fix: if self.sensors.gps_ok {
                GpsFix::Fix3D
            } else {
                GpsFix::NoFix
            },
            timestamp: now,
        });
        self.topics.land_detected.publish(LandDetected {
            landed,
            maybe_landed: landed,
            ground_contact: landed,
            timestamp: now,
        });
        self.topics.battery_status.publish(BatteryStatus {
            connected: true,
            warning: self.sensors.battery_warning,
            low_remaining_time: self.sensors.battery_low_remaining,
            timestamp: now,
        });
        self.topics
            .failure_detector_input
            .publish(strato_core::failure_detector::FailureDetectorInput {
                climb_rate: -self.model.vz,
                ..Default::default()
            });

        if self.sensors.rc_valid {
            self.topics
                .manual_control_setpoint
                .publish(ManualControlSetpoint {
                    valid: true,
                    x: 0.0,
                    y: 0.0,
                    z: self.sensors.rc_throttle,
                    r: 0.0,
                    sticks_moving: self.sensors.sticks_moving,
                    source: self.sensors.rc_source,
                    timestamp: now,
                });
        }

        if self.sensors.gcs_heartbeat {
            self.topics.telemetry_status.publish(TelemetryStatus {
                heartbeat_gcs: true,
                timestamp: now,
                ..Default::default()
            });
        }

        if self.sensors.wind_north != 0.0 || self.sensors.wind_east != 0.0 {
            self.topics.wind.publish(Wind {
                windspeed_north: self.sensors.wind_north,
                windspeed_east: self.sensors.wind_east,
                timestamp: now,
            });
        }
    }

    // ---- operator inputs ----------------------------------------------

    /// Publish a command addressed to this vehicle.
    pub fn send_command(&mut self, mut cmd: VehicleCommand) {
        cmd.target_system = 1;
        cmd.target_component = 1;
        cmd.source_system = 255;
        cmd.source_component = 190;
        cmd.from_external = true;
        cmd.timestamp = self.clock.now_us();
        self.topics.vehicle_command.publish(cmd);
    }

    pub fn send_action(
        &mut self,
        source: ActionRequestSource,
        action: ActionRequestAction,
        mode: Option<MainState>,
    ) {
        self.topics.action_request.publish(ActionRequest {
            source,
            action,
            mode,
            timestamp: self.clock.now_us(),
        });
    }

    pub fn press_power_button(&mut self) {
        let _ = self.power_button.enqueue(PowerButtonEvent::ShutdownRequest);
    }

    /// Arm through COMPONENT_ARM_DISARM.
    pub fn arm_command(&mut self, force: bool) {
        let mut cmd = VehicleCommand::internal(command_ids::COMPONENT_ARM_DISARM);
        cmd.param1 = 1.0;
        cmd.param2 = if force { 21196.0 } else { 0.0 };
        self.send_command(cmd);
    }

    pub fn disarm_command(&mut self, force: bool) {
        let mut cmd = VehicleCommand::internal(command_ids::COMPONENT_ARM_DISARM);
        cmd.param1 = 0.0;
        cmd.param2 = if force { 21196.0 } else { 0.0 };
        self.send_command(cmd);
    }

    /// DO_SET_MODE with an autopilot-specific mode pair.
    pub fn set_mode_command(&mut self, custom_main: u8, custom_sub: u8) {
        let mut cmd = VehicleCommand::internal(command_ids::DO_SET_MODE);
        cmd.param1 = 1.0; // custom mode enabled
        cmd.param2 = custom_main as f32;
        cmd.param3 = custom_sub as f32;
        self.send_command(cmd);
    }

    /// DO_SET_HOME at the current position.
    pub fn set_home_command(&mut self) {
        let mut cmd = VehicleCommand::internal(command_ids::DO_SET_HOME);
        cmd.param1 = 1.0;
        self.send_command(cmd);
    }

    /// Upload a straight-line mission of waypoints at `alt` above home.
    pub fn upload_mission(&mut self, waypoints: &[(f64, f64)], alt: f32) {
        let mut plan = MissionPlan::new();
        for (seq, (lat, lon)) in waypoints.iter().enumerate() {
            plan.items
                .push(MissionItem::waypoint(seq as u16, *lat, *lon, alt))
                .unwrap();
        }
        plan.timestamp = self.clock.now_us();
        self.topics.mission_plan.publish(plan);
    }

    /// Notify the tasks of an external parameter change.
    pub fn set_param(&mut self, name: &str, value: ParamValue) {
        self.store.borrow_mut().set(name, value).unwrap();
        self.topics.parameter_update.publish(ParameterUpdate {
            timestamp: self.clock.now_us(),
        });
    }

    // ---- observation helpers ------------------------------------------

    /// Drain all queued events.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.topics.event.pop() {
            events.push(event);
        }
        events
    }

    /// Drain all queued command acknowledgements.
    pub fn drain_acks(&mut self) -> Vec<CommandAck> {
        let mut acks = Vec::new();
        while let Some(ack) = self.topics.vehicle_command_ack.pop() {
            acks.push(ack);
        }
        acks
    }
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}
