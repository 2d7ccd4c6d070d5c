//! The autonomous-mission executor.
//!
//! Runs as its own cooperative task, driven solely by the navigation state
//! the commander publishes. One mode is active at a time; its per-tick
//! logic owns the position-setpoint triplet consumed by the external
//! position controller.

mod modes;
mod rtl;

pub use modes::{LoiterState, MissionExecState, MissionExecutionMode, TakeoffState};
pub use rtl::{RtlPhase, RtlState, RtlType};

use core::cell::RefCell;

use crate::bus::{Subscription, Topics};
use crate::events::{EventBuffer, Severity};
use crate::geo;
use crate::geofence::{FenceContainment, GeofenceConfig, GeofenceMonitor};
use crate::home::HomePosition;
use crate::mission::{MissionPlan, MissionResult};
use crate::params::{NavigatorParams, ParameterStore};
use crate::status::command_ids::*;
use crate::status::{
    CommandAck, CommandResult, GlobalPosition, LandDetected, LocalPosition, NavState,
    PositionControllerLandingStatus, PositionControllerStatus, PositionSetpointTriplet, RoiMode,
    SetpointType, VehicleCommand, VehicleRoi, VehicleStatus, VehicleType,
};
use crate::traits::TimeSource;

/// Recently warned traffic, to avoid repeating conflict warnings.
const TRAFFIC_BUFFER_LEN: usize = 8;

/// The active navigation mode, selected from the published nav state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveMode {
    #[default]
    None,
    Mission,
    Loiter,
    Rtl,
    Takeoff,
    VtolTakeoff,
    Land,
    Precland,
}

/// The navigator task.
pub struct Navigator<'t, T: TimeSource> {
    time: T,
    topics: &'t Topics,
    store: &'t RefCell<ParameterStore>,
    fence: &'t dyn FenceContainment,

    vehicle_command_sub: Subscription<'t, VehicleCommand>,
    parameter_update_sub: Subscription<'t, crate::params::ParameterUpdate>,
    vehicle_status_sub: Subscription<'t, VehicleStatus>,
    land_detected_sub: Subscription<'t, LandDetected>,
    home_sub: Subscription<'t, HomePosition>,
    global_sub: Subscription<'t, GlobalPosition>,
    local_sub: Subscription<'t, LocalPosition>,
    mission_plan_sub: Subscription<'t, MissionPlan>,
    pos_ctrl_status_sub: Subscription<'t, PositionControllerStatus>,
    pos_ctrl_landing_sub: Subscription<'t, PositionControllerLandingStatus>,

    vstatus: VehicleStatus,
    land_detected: LandDetected,
    home: HomePosition,
    global: GlobalPosition,
    local: LocalPosition,
    pos_ctrl_status: PositionControllerStatus,
    pos_ctrl_landing: PositionControllerLandingStatus,

    params: NavigatorParams,
    events: EventBuffer,

    plan: MissionPlan,
    mission: MissionExecState,
    mission_result: MissionResult,
    mission_result_updated: bool,

    triplet: PositionSetpointTriplet,
    triplet_updated: bool,
    /// Pending reposition target (DO_REPOSITION, geofence loiter).
    reposition_triplet: PositionSetpointTriplet,
    /// Pending takeoff target (NAV_TAKEOFF).
    takeoff_triplet: PositionSetpointTriplet,

    active_mode: ActiveMode,
    previous_nav_state: NavState,
    loiter: LoiterState,
    takeoff: TakeoffState,
    rtl: RtlState,
    triplet_published_invalid_once: bool,
    can_loiter_at_sp: bool,

    geofence_monitor: GeofenceMonitor,

    cruising_speed_override: Option<f32>,
    cruising_throttle_override: Option<f32>,

    /// ICAO addresses already warned about.
    traffic_buffer: heapless::Vec<u32, TRAFFIC_BUFFER_LEN>,
}

impl<'t, T: TimeSource> Navigator<'t, T> {
    /// Build the navigator. The fence containment source is a library
    /// handle owned by the composition root.
    pub fn new(
        time: T,
        topics: &'t Topics,
        store: &'t RefCell<ParameterStore>,
        fence: &'t dyn FenceContainment,
    ) -> Self {
        let params = {
            let mut store_mut = store.borrow_mut();
            NavigatorParams::register_defaults(&mut store_mut);
            NavigatorParams::from_store(&store_mut)
        };

        Self {
            vehicle_command_sub: topics.vehicle_command.subscribe(),
            parameter_update_sub: topics.parameter_update.subscribe(),
            vehicle_status_sub: topics.vehicle_status.subscribe(),
            land_detected_sub: topics.land_detected.subscribe(),
            home_sub: topics.home_position.subscribe(),
            global_sub: topics.global_position.subscribe(),
            local_sub: topics.local_position.subscribe(),
            mission_plan_sub: topics.mission_plan.subscribe(),
            pos_ctrl_status_sub: topics.position_controller_status.subscribe(),
            pos_ctrl_landing_sub: topics.position_controller_landing_status.subscribe(),
            vstatus: VehicleStatus::default(),
            land_detected: LandDetected::default(),
            home: HomePosition::default(),
            global: GlobalPosition::default(),
            local: LocalPosition::default(),
            pos_ctrl_status: PositionControllerStatus::default(),
            pos_ctrl_landing: PositionControllerLandingStatus::default(),
            params,
            events: EventBuffer::new(),
            plan: MissionPlan::new(),
            mission: MissionExecState::default(),
            mission_result: MissionResult::default(),
            mission_result_updated: false,
            triplet: PositionSetpointTriplet::default(),
            triplet_updated: false,
            reposition_triplet: PositionSetpointTriplet::default(),
            takeoff_triplet: PositionSetpointTriplet::default(),
            active_mode: ActiveMode::None,
            previous_nav_state: NavState::Manual,
            loiter: LoiterState::default(),
            takeoff: TakeoffState::default(),
            rtl: RtlState::default(),
            triplet_published_invalid_once: false,
            can_loiter_at_sp: false,
            geofence_monitor: GeofenceMonitor::new(),
            cruising_speed_override: None,
            cruising_throttle_override: None,
            traffic_buffer: heapless::Vec::new(),
            time,
            topics,
            store,
            fence,
        }
    }

    pub fn triplet(&self) -> &PositionSetpointTriplet {
        &self.triplet
    }

    pub fn mission_result(&self) -> &MissionResult {
        &self.mission_result
    }

    pub fn active_mode(&self) -> ActiveMode {
        self.active_mode
    }

    /// True when the active mode has established a loiter the controllers
    /// can hold without a new setpoint.
    pub fn can_loiter_at_setpoint(&self) -> bool {
        self.can_loiter_at_sp
    }

    /// One pass of the navigator loop.
    pub fn tick(&mut self) {
        let now = self.time.now_us();

        // Parameters only change while disarmed.
        if self.parameter_update_sub.updated() {
            self.parameter_update_sub.copy();
            if self.vstatus.arming_state != crate::status::ArmingState::Armed {
                self.params = NavigatorParams::from_store(&self.store.borrow());
            }
        }

        self.vehicle_status_sub.update(&mut self.vstatus);
        self.land_detected_sub.update(&mut self.land_detected);
        self.home_sub.update(&mut self.home);
        self.global_sub.update(&mut self.global);
        self.local_sub.update(&mut self.local);
        self.pos_ctrl_status_sub.update(&mut self.pos_ctrl_status);
        self.pos_ctrl_landing_sub.update(&mut self.pos_ctrl_landing);

        self.check_plan_update(now);
        self.handle_commands(now);
        self.check_traffic(now);
        self.geofence_breach_check(now);
        self.dispatch_mode(now);

        if self.triplet_updated {
            self.triplet.timestamp = now;
            self.topics.position_setpoint_triplet.publish(self.triplet);
            self.triplet_updated = false;
        }
        if self.mission_result_updated {
            self.mission_result.timestamp = now;
            self.topics.mission_result.publish(self.mission_result);
            self.mission_result_updated = false;
        }

        for event in self.events.events() {
            self.topics.event.publish(*event);
        }
        self.events.clear();
    }

    // ---- plan and command intake ---------------------------------------

    fn check_plan_update(&mut self, now: u64) {
        if !self.mission_plan_sub.updated() {
            return;
        }
        let Some(plan) = self.mission_plan_sub.copy() else {
            return;
        };

        let valid = !plan.is_empty() && plan.items.iter().any(|item| item.is_nav());
        self.plan = plan;
        self.mission.reset();

        self.mission_result.valid = valid;
        self.mission_result.failure = false;
        self.mission_result.finished = false;
        self.mission_result.instance_count = self.mission_result.instance_count.wrapping_add(1);
        self.mission_result.seq_total = self.plan.count();
        self.mission_result.seq_current = 0;
        self.mission_result.land_start_available = self.plan.land_start_index().is_some();
        self.mission_result.land_start_index = self.plan.land_start_index().unwrap_or(0);
        self.mission_result.timestamp = now;
        self.mission_result_updated = true;
    }

    fn handle_commands(&mut self, now: u64) {
        if !self.vehicle_command_sub.updated() {
            return;
        }
        if self.vehicle_command_sub.missed() > 0 {
            self.events.push(
                "navigator_vehicle_command_lost",
                Severity::Warning,
                "vehicle_command generations lost",
            );
        }
        let Some(cmd) = self.vehicle_command_sub.copy() else {
            return;
        };

        match cmd.command {
            DO_GO_AROUND => {
                // handled by the position controller; acknowledged here
                self.publish_ack(&cmd, CommandResult::Accepted, now);
            }

            DO_REPOSITION if self.vstatus.arming_state == crate::status::ArmingState::Armed => {
                // only while armed; a stale reposition executing on the next
                // loiter entry would be unexpected and dangerous
                self.handle_reposition(&cmd, now);
            }

            DO_ORBIT if self.vstatus.vehicle_type == VehicleType::FixedWing => {
                self.handle_orbit(&cmd, now);
            }

            NAV_TAKEOFF => {
                self.handle_takeoff_command(&cmd, now);
                // acknowledged by the commander
            }

            NAV_VTOL_TAKEOFF => {
                self.takeoff.transition_alt = cmd.param7;
                self.takeoff.loiter_lat = cmd.param5;
                self.takeoff.loiter_lon = cmd.param6;
            }

            DO_LAND_START => {
                if let Some(index) = self.plan.land_start_index() {
                    let mut start = VehicleCommand::internal(MISSION_START);
                    start.param1 = index as f32;
                    start.source_system = self.vstatus.system_id;
                    start.source_component = self.vstatus.component_id;
                    start.target_system = self.vstatus.system_id;
                    start.target_component = self.vstatus.component_id;
                    start.timestamp = now;
                    self.topics.vehicle_command.publish(start);
                } else {
                    self.events.push(
                        "navigator_land_start_unavailable",
                        Severity::Warning,
                        "Planned mission landing not available",
                    );
                }
                self.publish_ack(&cmd, CommandResult::Accepted, now);
            }

            MISSION_START => {
                if self.mission_result.valid && cmd.param1.is_finite() && cmd.param1 >= 0.0 {
                    let index = cmd.param1 as u16;
                    if !self.mission.set_current(index, &self.plan) {
                        self.events.push(
                            "navigator_mission_start_failed",
                            Severity::Warning,
                            "Mission start index rejected",
                        );
                    } else {
                        self.mission_result.seq_current = index;
                        self.mission_result_updated = true;
                    }
                }
                // acknowledged by the commander
            }

            DO_CHANGE_SPEED => {
                if cmd.param2 > f32::EPSILON {
                    self.cruising_speed_override = Some(cmd.param2);
                } else {
                    self.cruising_speed_override = None;
                    if cmd.param3 > f32::EPSILON {
                        self.cruising_throttle_override = Some(cmd.param3 / 100.0);
                    } else {
                        self.cruising_throttle_override = None;
                    }
                }
                self.publish_ack(&cmd, CommandResult::Accepted, now);
            }

            DO_SET_ROI | NAV_ROI | DO_SET_ROI_LOCATION | DO_SET_ROI_WPNEXT_OFFSET
            | DO_SET_ROI_NONE => {
                self.handle_roi(&cmd, now);
            }

            _ => {}
        }
    }

    fn handle_reposition(&mut self, cmd: &VehicleCommand, now: u64) {
        let target_lat = if cmd.param5.is_finite() {
            cmd.param5
        } else {
            self.global.lat
        };
        let target_lon = if cmd.param6.is_finite() {
            cmd.param6
        } else {
            self.global.lon
        };
        let target_alt = if cmd.param7.is_finite() {
            cmd.param7
        } else {
            self.global.alt
        };

        if self.fence.has_fence() && !self.fence.inside(target_lat, target_lon, target_alt) {
            self.events.push(
                "navigator_reposition_outside_geofence",
                Severity::Critical,
                "Reposition is outside geofence",
            );
            return;
        }

        let cruising_speed = self.cruising_speed();
        let cruising_throttle = self.cruising_throttle();
        let acceptance_radius = self.acceptance_radius();
        let loiter_radius = self.loiter_radius();
        let braking_stop = self.braking_stop();

        let rep = &mut self.reposition_triplet;
        rep.previous.yaw = self.local.heading;
        rep.previous.lat = self.global.lat;
        rep.previous.lon = self.global.lon;
        rep.previous.alt = self.global.alt;
        rep.previous.valid = true;
        rep.previous.timestamp = now;

        rep.current.setpoint_type = SetpointType::Loiter;
        rep.current.cruising_speed = if cmd.param1 > 0.0 && cmd.param1.is_finite() {
            cmd.param1
        } else {
            cruising_speed
        };
        rep.current.cruising_throttle = cruising_throttle;
        rep.current.acceptance_radius = acceptance_radius;
        rep.current.loiter_radius = loiter_radius;

        if cmd.param4.is_finite() {
            rep.current.yaw = cmd.param4;
            rep.current.yaw_valid = true;
        } else {
            rep.current.yaw = f32::NAN;
            rep.current.yaw_valid = false;
        }

        if cmd.param5.is_finite() && cmd.param6.is_finite() {
            rep.current.lat = cmd.param5;
            rep.current.lon = cmd.param6;
            rep.current.alt = target_alt;
        } else if cmd.param7.is_finite() || cmd.param4.is_finite() {
            // altitude or heading change only: keep the position target
            rep.current.lat = if self.triplet.current.lat.is_finite() {
                self.triplet.current.lat
            } else {
                self.global.lat
            };
            rep.current.lon = if self.triplet.current.lon.is_finite() {
                self.triplet.current.lon
            } else {
                self.global.lon
            };
            rep.current.alt = target_alt;
        } else {
            // everything NaN: pause at the braking stop
            rep.current.alt = self.global.alt;
            if self.vstatus.vehicle_type == VehicleType::RotaryWing
                && self.triplet.current.setpoint_type != SetpointType::Takeoff
            {
                let (lat, lon, yaw) = braking_stop;
                rep.current.lat = lat;
                rep.current.lon = lon;
                rep.current.yaw = yaw;
                rep.current.yaw_valid = true;
            } else {
                rep.current.lat = self.global.lat;
                rep.current.lon = self.global.lon;
            }
        }

        rep.current.alt_valid = true;
        rep.current.valid = true;
        rep.current.timestamp = now;
        rep.next.valid = false;
        // CMD_DO_REPOSITION is acknowledged by the commander
    }

    fn handle_orbit(&mut self, cmd: &VehicleCommand, now: u64) {
        let lat = if cmd.param5.is_finite() {
            cmd.param5
        } else {
            self.global.lat
        };
        let lon = if cmd.param6.is_finite() {
            cmd.param6
        } else {
            self.global.lon
        };
        let alt = if cmd.param7.is_finite() {
            cmd.param7
        } else {
            self.global.alt
        };

        if self.fence.has_fence() && !self.fence.inside(lat, lon, alt) {
            self.events.push(
                "navigator_orbit_outside_geofence",
                Severity::Critical,
                "Orbit is outside geofence",
            );
            return;
        }

        let cruising_throttle = self.cruising_throttle();
        let rep = &mut self.reposition_triplet;
        rep.current.setpoint_type = SetpointType::Loiter;
        rep.current.loiter_radius = self.params.nav_loiter_rad;
        rep.current.loiter_direction_counter_clockwise = false;
        if cmd.param1.is_finite() {
            rep.current.loiter_radius = libm::fabsf(cmd.param1);
            rep.current.loiter_direction_counter_clockwise = cmd.param1 < 0.0;
        }
        rep.current.lat = lat;
        rep.current.lon = lon;
        rep.current.alt = alt;
        rep.current.alt_valid = true;
        rep.current.cruising_throttle = cruising_throttle;
        rep.current.valid = true;
        rep.current.timestamp = now;
    }

    fn handle_takeoff_command(&mut self, cmd: &VehicleCommand, now: u64) {
        let rep = &mut self.takeoff_triplet;

        rep.previous.yaw = self.local.heading;
        rep.previous.lat = self.global.lat;
        rep.previous.lon = self.global.lon;
        rep.previous.alt = self.global.alt;

        rep.current.setpoint_type = SetpointType::Takeoff;
        rep.current.loiter_radius = self.params.nav_loiter_rad;
        rep.current.loiter_direction_counter_clockwise = false;

        if self.home.valid {
            // true heading is known whenever the global estimate is good
            rep.current.yaw = cmd.param4;
            rep.previous.valid = true;
            rep.previous.timestamp = now;
        } else {
            rep.current.yaw = self.local.heading;
            rep.previous.valid = false;
        }

        if cmd.param5.is_finite() && cmd.param6.is_finite() {
            rep.current.lat = cmd.param5;
            rep.current.lon = cmd.param6;
        } else {
            rep.current.lat = self.global.lat;
            rep.current.lon = self.global.lon;
        }
        rep.current.alt = if cmd.param7.is_finite() {
            cmd.param7
        } else if self.home.valid {
            self.home.alt + self.params.mis_takeoff_alt
        } else {
            self.global.alt + self.params.mis_takeoff_alt
        };
        rep.current.alt_valid = true;
        rep.current.valid = true;
        rep.current.timestamp = now;
        rep.next.valid = false;
    }

    fn handle_roi(&mut self, cmd: &VehicleCommand, now: u64) {
        let mut roi = VehicleRoi::default();

        match cmd.command {
            DO_SET_ROI_LOCATION => {
                roi.mode = RoiMode::Location;
                roi.lat = cmd.param5;
                roi.lon = cmd.param6;
                roi.alt = cmd.param7;
            }
            DO_SET_ROI_WPNEXT_OFFSET => {
                roi.mode = RoiMode::NextWaypoint;
                roi.pitch_offset = (cmd.param5 as f32).to_radians();
                roi.roll_offset = (cmd.param6 as f32).to_radians();
                roi.yaw_offset = cmd.param7.to_radians();
            }
            DO_SET_ROI | NAV_ROI if cmd.param1 as i32 == 3 => {
                roi.mode = RoiMode::Location;
                roi.lat = cmd.param5;
                roi.lon = cmd.param6;
                roi.alt = cmd.param7;
            }
            _ => {
                roi.mode = RoiMode::None;
            }
        }

        roi.timestamp = now;
        self.topics.vehicle_roi.publish(roi);
        self.publish_ack(&cmd, CommandResult::Accepted, now);
    }

    // ---- traffic avoidance ---------------------------------------------

    fn check_traffic(&mut self, now: u64) {
        while let Some(report) = self.topics.transponder_report.pop() {
            if self.params.nav_traff_avoid <= 0 || !self.global.valid {
                continue;
            }
            if !report.lat.is_finite() || !report.lon.is_finite() {
                continue;
            }

            let dist = geo::distance(self.global.lat, self.global.lon, report.lat, report.lon);
            let alt_diff = libm::fabsf(report.altitude - self.global.alt);

            if dist < self.params.nav_traff_a_hor as f64 && alt_diff < self.params.nav_traff_a_ver
            {
                if self.traffic_buffer.contains(&report.icao_address) {
                    continue;
                }
                if self.traffic_buffer.is_full() {
                    self.traffic_buffer.remove(0);
                }
                let _ = self.traffic_buffer.push(report.icao_address);

                self.events.push(
                    "navigator_traffic_conflict",
                    Severity::Critical,
                    "Aircraft proximity warning",
                );

                // 2 = RTL, 3 = land
                if self.params.nav_traff_avoid >= 2 {
                    let mut cmd = VehicleCommand::internal(if self.params.nav_traff_avoid >= 3 {
                        NAV_LAND
                    } else {
                        NAV_RETURN_TO_LAUNCH
                    });
                    cmd.source_system = self.vstatus.system_id;
                    cmd.source_component = self.vstatus.component_id;
                    cmd.target_system = self.vstatus.system_id;
                    cmd.target_component = self.vstatus.component_id;
                    cmd.timestamp = now;
                    self.topics.vehicle_command.publish(cmd);
                }
            }
        }
    }

    // ---- geofence ------------------------------------------------------

    fn geofence_breach_check(&mut self, now: u64) {
        let config = GeofenceConfig {
            action: self.params.gf_action,
            max_hor_dist: self.params.gf_max_hor_dist,
            max_ver_dist: self.params.gf_max_ver_dist,
            predict: self.params.gf_predict,
            acc_hor: self.params.mpc_acc_hor,
            acc_ver: self.params.mpc_acc_ver,
            loiter_radius: self.params.nav_loiter_rad,
        };

        let nav_bearing = (now.saturating_sub(self.pos_ctrl_status.timestamp) < 100_000
            && self.pos_ctrl_status.nav_bearing.is_finite())
        .then_some(self.pos_ctrl_status.nav_bearing);

        let Some(outcome) = self.geofence_monitor.check(
            self.fence,
            &config,
            &self.global,
            &self.local,
            &self.home,
            self.vstatus.vehicle_type,
            nav_bearing,
            now,
        ) else {
            return;
        };

        if outcome.first_breach
            && self.vstatus.arming_state == crate::status::ArmingState::Armed
        {
            let message = if config.predict {
                "Approaching on geofence"
            } else {
                "Geofence exceeded"
            };
            self.events
                .push("navigator_geofence_violation", Severity::Warning, message);

            if let Some(point) = outcome.loiter_point {
                self.build_geofence_loiter(point, now);
            }
        }

        self.topics.geofence_result.publish(outcome.result);
    }

    fn build_geofence_loiter(&mut self, (lat, lon, alt): (f64, f64, f32), now: u64) {
        let loiter_radius = self.loiter_radius();
        let cruising_throttle = self.cruising_throttle();
        let cruising_speed = self.cruising_speed();
        let acceptance_radius = self.acceptance_radius();

        let rep = &mut self.reposition_triplet;
        rep.current.timestamp = now;
        rep.current.yaw = self.local.heading;
        rep.current.yaw_valid = true;
        rep.current.lat = lat;
        rep.current.lon = lon;
        rep.current.alt = alt;
        rep.current.alt_valid = true;
        rep.current.valid = true;
        rep.current.setpoint_type = SetpointType::Loiter;
        rep.current.loiter_radius = loiter_radius;
        rep.current.cruising_throttle = cruising_throttle;
        rep.current.cruising_speed = cruising_speed;
        rep.current.acceptance_radius = acceptance_radius;
    }

    // ---- helpers shared by the modes -----------------------------------

    pub(crate) fn cruising_speed(&self) -> f32 {
        if let Some(speed) = self.cruising_speed_override {
            return speed;
        }
        if self.vstatus.vehicle_type == VehicleType::RotaryWing {
            self.params.mpc_xy_cruise
        } else {
            -1.0
        }
    }

    pub(crate) fn cruising_throttle(&self) -> f32 {
        self.cruising_throttle_override.unwrap_or(-1.0)
    }

    pub(crate) fn acceptance_radius(&self) -> f32 {
        self.params.nav_acc_rad
    }

    pub(crate) fn loiter_radius(&self) -> f32 {
        self.params.nav_loiter_rad
    }

    /// Project the braking stop for a pause request.
    fn braking_stop(&self) -> (f64, f64, f32) {
        let speed = libm::sqrtf(self.local.vx * self.local.vx + self.local.vy * self.local.vy);
        let bearing = libm::atan2f(self.local.vy, self.local.vx);
        let distance = crate::geofence::braking_distance(speed, self.params.mpc_acc_hor);
        let (lat, lon) = geo::waypoint_from_heading_and_distance(
            self.global.lat,
            self.global.lon,
            bearing as f64,
            distance as f64,
        );
        (lat, lon, bearing)
    }

    fn publish_ack(&mut self, cmd: &VehicleCommand, result: CommandResult, now: u64) {
        self.topics.vehicle_command_ack.publish(CommandAck {
            command: cmd.command,
            result,
            target_system: cmd.source_system,
            target_component: cmd.source_component,
            timestamp: now,
        });
    }

    // ---- mode dispatch -------------------------------------------------

    fn dispatch_mode(&mut self, now: u64) {
        let mut new_mode = match self.vstatus.nav_state {
            NavState::AutoMission => ActiveMode::Mission,
            NavState::AutoLoiter => ActiveMode::Loiter,
            NavState::AutoRtl => ActiveMode::Rtl,
            NavState::AutoTakeoff => ActiveMode::Takeoff,
            NavState::AutoVtolTakeoff => ActiveMode::VtolTakeoff,
            NavState::AutoLand => ActiveMode::Land,
            NavState::AutoPrecland => ActiveMode::Precland,
            _ => {
                self.can_loiter_at_sp = false;
                ActiveMode::None
            }
        };

        // RTL sub-type selection may redirect into the mission executor.
        if new_mode == ActiveMode::Rtl {
            new_mode = self.select_rtl_mode(now);
        }

        // Never execute a mode while disarmed.
        if self.vstatus.arming_state != crate::status::ArmingState::Armed {
            new_mode = ActiveMode::None;
        }

        if new_mode != ActiveMode::None {
            self.triplet_published_invalid_once = false;
        }

        if self.active_mode != new_mode {
            // The triplet survives two transitions: takeoff handing over to
            // loiter (the takeoff altitude must not be lost), and entering
            // loiter when a valid loiter setpoint is already established.
            let takeoff_to_loiter =
                self.active_mode == ActiveMode::Takeoff && new_mode == ActiveMode::Loiter;
            let loiter_with_valid_sp =
                new_mode == ActiveMode::Loiter && self.triplet.holds_valid_loiter();

            if !takeoff_to_loiter && !loiter_with_valid_sp {
                self.triplet.reset();
                self.triplet_updated = true;
            }

            self.on_mode_entry(new_mode, now);
        }

        self.previous_nav_state = self.vstatus.nav_state;
        self.active_mode = new_mode;

        match self.active_mode {
            ActiveMode::None => {
                if !self.triplet_published_invalid_once {
                    self.triplet_published_invalid_once = true;
                    self.triplet.reset();
                    self.triplet_updated = true;
                }
            }
            ActiveMode::Mission => self.mission_tick(now),
            ActiveMode::Loiter => self.loiter_tick(now),
            ActiveMode::Rtl => self.rtl_tick(now),
            ActiveMode::Takeoff => self.takeoff_tick(now),
            ActiveMode::VtolTakeoff => self.vtol_takeoff_tick(now),
            ActiveMode::Land => self.land_tick(now),
            ActiveMode::Precland => self.precland_tick(now),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;

    use super::*;
    use crate::geofence::NoFence;
    use crate::status::{ArmingState, VehicleType};
    use crate::traits::MockTime;

    struct Fixture {
        time: MockTime,
        topics: &'static Topics,
        navigator: Navigator<'static, MockTime>,
    }

    impl Fixture {
        fn new() -> Self {
            let time = MockTime::with_initial(1_000_000);
            let topics: &'static Topics = Box::leak(Box::new(Topics::new()));
            let store = Box::leak(Box::new(RefCell::new(ParameterStore::new())));
            let fence: &'static NoFence = Box::leak(Box::new(NoFence));
            let navigator = Navigator::new(time.clone(), topics, store, fence);
            Self {
                time,
                topics,
                navigator,
            }
        }

        fn publish_status(&self, armed: bool, nav_state: NavState) {
            let status = VehicleStatus {
                arming_state: if armed {
                    ArmingState::Armed
                } else {
                    ArmingState::Standby
                },
                nav_state,
                vehicle_type: VehicleType::RotaryWing,
                ..Default::default()
            };
            self.topics.vehicle_status.publish(status);
        }

        fn publish_position(&self, lat: f64, lon: f64, alt: f32) {
            self.topics.global_position.publish(GlobalPosition {
                lat,
                lon,
                alt,
                valid: true,
                timestamp: self.time.now_us(),
            });
        }

        fn publish_home(&self, lat: f64, lon: f64, alt: f32) {
            self.topics.home_position.publish(HomePosition {
                lat,
                lon,
                alt,
                yaw: 0.0,
                valid: true,
                manual_home: false,
                timestamp: self.time.now_us(),
            });
        }

        fn tick(&mut self) {
            self.time.advance(10_000);
            self.navigator.tick();
        }
    }

    #[test]
    fn disarmed_publishes_invalid_triplet_once() {
        let mut f = Fixture::new();
        f.publish_status(false, NavState::AutoLoiter);
        f.publish_position(47.0, 8.0, 500.0);

        f.tick();
        assert_eq!(f.navigator.active_mode(), ActiveMode::None);
        let generation = f.topics.position_setpoint_triplet.generation();
        assert!(generation > 0);
        assert!(!f.topics.position_setpoint_triplet.read().unwrap().current.valid);

        // no re-publication while nothing changes
        f.tick();
        f.tick();
        assert_eq!(f.topics.position_setpoint_triplet.generation(), generation);
    }

    #[test]
    fn takeoff_to_loiter_preserves_altitude() {
        let mut f = Fixture::new();
        f.publish_home(47.0, 8.0, 488.0);
        f.publish_position(47.0, 8.0, 488.0);
        f.publish_status(true, NavState::AutoTakeoff);
        f.tick();

        let triplet = f.topics.position_setpoint_triplet.read().unwrap();
        assert_eq!(triplet.current.setpoint_type, SetpointType::Takeoff);
        let takeoff_alt = triplet.current.alt;
        assert!((takeoff_alt - 490.5).abs() < 0.01); // home + MIS_TAKEOFF_ALT

        // altitude reached, commander switches to hold
        f.publish_position(47.0, 8.0, takeoff_alt);
        f.tick();
        f.publish_status(true, NavState::AutoLoiter);
        f.tick();

        let triplet = f.topics.position_setpoint_triplet.read().unwrap();
        assert_eq!(f.navigator.active_mode(), ActiveMode::Loiter);
        assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
        assert!((triplet.current.alt - takeoff_alt).abs() < 0.01);
    }

    #[test]
    fn loiter_without_prior_setpoint_holds_current_position() {
        let mut f = Fixture::new();
        f.publish_position(47.123, 8.456, 520.0);
        f.publish_status(true, NavState::AutoLoiter);
        f.tick();

        let triplet = f.topics.position_setpoint_triplet.read().unwrap();
        assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
        assert_eq!(triplet.current.lat, 47.123);
        assert_eq!(triplet.current.lon, 8.456);
        assert_eq!(triplet.current.alt, 520.0);
        assert!(f.navigator.can_loiter_at_setpoint());
    }

    #[test]
    fn takeoff_completion_reports_mission_finished() {
        let mut f = Fixture::new();
        f.publish_home(47.0, 8.0, 488.0);
        f.publish_position(47.0, 8.0, 488.0);
        f.publish_status(true, NavState::AutoTakeoff);
        f.tick();
        assert!(!f.navigator.mission_result().finished);

        f.publish_position(47.0, 8.0, 490.5);
        f.tick();
        assert!(f.navigator.mission_result().finished);
        let result = f.topics.mission_result.read().unwrap();
        assert!(result.finished);
    }

    #[test]
    fn rtl_direct_flies_home_and_lands() {
        let mut f = Fixture::new();
        f.publish_home(47.0, 8.0, 488.0);
        f.publish_position(47.001, 8.0, 520.0);
        f.publish_status(true, NavState::AutoRtl);
        f.tick();

        assert_eq!(f.navigator.active_mode(), ActiveMode::Rtl);
        // climb phase first: RTL_RETURN_ALT (60 m) above home
        let triplet = f.topics.position_setpoint_triplet.read().unwrap();
        assert!((triplet.current.alt - 548.0).abs() < 0.01);

        // at return altitude the target becomes home
        f.publish_position(47.001, 8.0, 548.0);
        f.tick();
        f.tick();
        let triplet = f.topics.position_setpoint_triplet.read().unwrap();
        assert_eq!(triplet.current.lat, 47.0);
        assert_eq!(triplet.current.lon, 8.0);
    }
}
