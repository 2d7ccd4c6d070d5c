//! The supervisory task.
//!
//! A fixed-period cooperative loop: each tick snapshots the inputs,
//! advances the monitors and state machines, resolves the navigation
//! state, and publishes the output records when anything changed or the
//! periodic deadline passed. Commands and operator actions are consumed at
//! most one per tick so a burst can never starve the safety checks.

mod actions;
mod commands;
mod control_mode;

pub use control_mode::control_mode_for_nav_state;

use core::cell::RefCell;

use heapless::spsc::Consumer;

use crate::arming::{ArmStateMachine, HealthAndArmingChecks, TransitionResult};
use crate::bus::{Subscription, Topics};
use crate::events::{EventBuffer, Severity};
use crate::failsafe::{self, FailsafeConditions};
use crate::failure_detector::{
    FailureDetector, FailureDetectorInput, FailureDetectorParams, FailureFlags,
};
use crate::geofence::{GeofenceAction, GeofenceResult};
use crate::home::HomePositionManager;
use crate::hysteresis::Hysteresis;
use crate::mission::MissionResult;
use crate::mode::main_state_transition;
use crate::monitors::{
    battery_failsafe_action, AutoDisarm, AutoDisarmEvent, BatteryMonitor, LinkMonitor,
    LinkTimeouts, WindAction, WindMonitor,
};
use crate::params::{CommanderParams, ParamValue, ParameterStore};
use crate::status::{
    ActuatorArmed, ActuatorArmedFlags, ArmDisarmReason, ArmingState, BatteryStatus,
    CommanderState, CpuLoad, GlobalPosition, GpsFix, GpsPosition, LandDetected, LedColor,
    LedControl, LedMode, LocalPosition, MainState, ManualControlSetpoint, NavState,
    OffboardControlMode, PowerButtonEvent, Safety, StatusFlags, SystemPower, TuneControl, TuneId,
    VehicleCommand, VehicleControlMode, VehicleStatus, VtolState, VtolVehicleStatus, Wind,
    PARACHUTE_ACTION_RELEASE,
};
use crate::status::command_ids;
use crate::traits::TimeSource;

/// Tick period of the supervisory loop.
pub const COMMANDER_MONITORING_INTERVAL_US: u64 = 10_000;

/// Status records are republished at least this often.
const PUBLISH_INTERVAL_US: u64 = 500_000;

/// Home is not set on arming within this window after boot, so a brown-out
/// restart in flight cannot overwrite home.
const INAIR_RESTART_HOLDOFF_US: u64 = 500_000;

/// An RC-switch re-arm within this window after disarming skips the
/// preflight checks (accidental in-air disarm recovery).
const REARM_GRACE_PERIOD_US: u64 = 5_000_000;

/// Minimum spacing of "mode not available" notifications.
const MODE_REJECT_INTERVAL_US: u64 = 1_000_000;

/// CPU load above which the overload LED pattern engages.
const OVERLOAD_CPU_LOAD: f32 = 0.95;

/// Handle for long operations offloaded to the worker task.
#[derive(Debug, Default)]
pub struct WorkerThread {
    busy: bool,
    result: Option<i32>,
}

impl WorkerThread {
    /// Claim the worker. Fails while a job is running.
    pub fn start(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        self.result = None;
        true
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Called by the worker task when the job finished.
    pub fn finish(&mut self, result: i32) {
        self.busy = false;
        self.result = Some(result);
    }

    fn take_result(&mut self) -> Option<i32> {
        self.result.take()
    }
}

/// The commander task.
pub struct Commander<'t, T: TimeSource> {
    time: T,
    topics: &'t Topics,
    store: &'t RefCell<ParameterStore>,
    power_button: Consumer<'t, PowerButtonEvent>,

    // Subscriptions with edge semantics.
    vehicle_command_sub: Subscription<'t, VehicleCommand>,
    parameter_update_sub: Subscription<'t, crate::params::ParameterUpdate>,
    land_detected_sub: Subscription<'t, LandDetected>,
    manual_control_sub: Subscription<'t, ManualControlSetpoint>,
    offboard_sub: Subscription<'t, OffboardControlMode>,
    vtol_sub: Subscription<'t, VtolVehicleStatus>,
    wind_sub: Subscription<'t, Wind>,
    battery_sub: Subscription<'t, BatteryStatus>,
    system_power_sub: Subscription<'t, SystemPower>,
    safety_sub: Subscription<'t, Safety>,
    geofence_result_sub: Subscription<'t, GeofenceResult>,
    mission_result_sub: Subscription<'t, MissionResult>,
    iridium_sub: Subscription<'t, crate::status::IridiumStatus>,
    fd_input_sub: Subscription<'t, FailureDetectorInput>,
    cpu_load_sub: Subscription<'t, CpuLoad>,
    global_position_sub: Subscription<'t, GlobalPosition>,
    local_position_sub: Subscription<'t, LocalPosition>,
    gps_sub: Subscription<'t, GpsPosition>,

    // State machines, checks and monitors.
    arm_state_machine: ArmStateMachine,
    health_checks: HealthAndArmingChecks,
    failure_detector: FailureDetector,
    home: HomePositionManager,
    link_monitor: LinkMonitor,
    battery_monitor: BatteryMonitor,
    wind_monitor: WindMonitor,
    auto_disarm: AutoDisarm,
    offboard_available: Hysteresis,
    pub worker: WorkerThread,

    // Published records.
    status: VehicleStatus,
    flags: StatusFlags,
    armed: ActuatorArmed,
    internal: CommanderState,
    control_mode: VehicleControlMode,

    // Cached input snapshots.
    land_detected: LandDetected,
    manual_control: ManualControlSetpoint,
    offboard_mode: OffboardControlMode,
    vtol_status: VtolVehicleStatus,
    geofence_result: GeofenceResult,
    mission_result: MissionResult,
    global_position: GlobalPosition,
    local_position: LocalPosition,
    gps_position: GpsPosition,
    fd_input: FailureDetectorInput,
    cpu_load: CpuLoad,

    params: CommanderParams,
    events: EventBuffer,

    // Bookkeeping.
    boot_timestamp: u64,
    last_disarmed_timestamp: u64,
    last_valid_manual_control: u64,
    last_publish: u64,
    last_mode_reject: u64,
    have_taken_off_since_arming: bool,
    was_armed: bool,
    failsafe_old: bool,
    is_throttle_above_center: bool,
    is_throttle_low: bool,
    status_changed: bool,
    lockdown_triggered: bool,
    flight_termination_triggered: bool,
    imbalanced_prop_check_triggered: bool,
    geofence_loiter_on: bool,
    geofence_rtl_on: bool,
    geofence_land_on: bool,
    geofence_warning_action_on: bool,
    geofence_violated_prev: bool,
    arm_tune_played: bool,
    last_tune: Option<TuneId>,
    last_led: Option<LedControl>,
    parachute_component_id: u8,
    should_exit: bool,
}

impl<'t, T: TimeSource> Commander<'t, T> {
    /// Build the commander. Registers its parameter defaults.
    ///
    /// The parachute component id is a composition-root decision, not a
    /// subscription side effect.
    pub fn new(
        time: T,
        topics: &'t Topics,
        store: &'t RefCell<ParameterStore>,
        power_button: Consumer<'t, PowerButtonEvent>,
        parachute_component_id: u8,
    ) -> Self {
        let (params, fd_params) = {
            let mut store_mut = store.borrow_mut();
            CommanderParams::register_defaults(&mut store_mut);
            FailureDetectorParams::register_defaults(&mut store_mut);
            (
                CommanderParams::from_store(&store_mut),
                FailureDetectorParams::from_store(&store_mut),
            )
        };

        let boot_timestamp = time.now_us();

        let mut commander = Self {
            vehicle_command_sub: topics.vehicle_command.subscribe(),
            parameter_update_sub: topics.parameter_update.subscribe(),
            land_detected_sub: topics.land_detected.subscribe(),
            manual_control_sub: topics.manual_control_setpoint.subscribe(),
            offboard_sub: topics.offboard_control_mode.subscribe(),
            vtol_sub: topics.vtol_vehicle_status.subscribe(),
            wind_sub: topics.wind.subscribe(),
            battery_sub: topics.battery_status.subscribe(),
            system_power_sub: topics.system_power.subscribe(),
            safety_sub: topics.safety.subscribe(),
            geofence_result_sub: topics.geofence_result.subscribe(),
            mission_result_sub: topics.mission_result.subscribe(),
            iridium_sub: topics.iridium_status.subscribe(),
            fd_input_sub: topics.failure_detector_input.subscribe(),
            cpu_load_sub: topics.cpu_load.subscribe(),
            global_position_sub: topics.global_position.subscribe(),
            local_position_sub: topics.local_position.subscribe(),
            gps_sub: topics.gps_position.subscribe(),
            arm_state_machine: ArmStateMachine::new(),
            health_checks: HealthAndArmingChecks::new(),
            failure_detector: FailureDetector::new(fd_params),
            home: HomePositionManager::new(),
            link_monitor: LinkMonitor::new(),
            battery_monitor: BatteryMonitor::new(),
            wind_monitor: WindMonitor::new(),
            auto_disarm: AutoDisarm::new(),
            offboard_available: Hysteresis::new(false),
            worker: WorkerThread::default(),
            status: VehicleStatus::default(),
            flags: StatusFlags::default(),
            armed: ActuatorArmed::default(),
            internal: CommanderState::default(),
            control_mode: VehicleControlMode::default(),
            land_detected: LandDetected::default(),
            manual_control: ManualControlSetpoint::default(),
            offboard_mode: OffboardControlMode::default(),
            vtol_status: VtolVehicleStatus::default(),
            geofence_result: GeofenceResult::default(),
            mission_result: MissionResult::default(),
            global_position: GlobalPosition::default(),
            local_position: LocalPosition::default(),
            gps_position: GpsPosition::default(),
            fd_input: FailureDetectorInput::default(),
            cpu_load: CpuLoad::default(),
            params,
            events: EventBuffer::new(),
            boot_timestamp,
            last_disarmed_timestamp: 0,
            last_valid_manual_control: 0,
            last_publish: 0,
            last_mode_reject: 0,
            have_taken_off_since_arming: false,
            was_armed: false,
            failsafe_old: false,
            is_throttle_above_center: false,
            is_throttle_low: false,
            status_changed: true,
            lockdown_triggered: false,
            flight_termination_triggered: false,
            imbalanced_prop_check_triggered: false,
            geofence_loiter_on: false,
            geofence_rtl_on: false,
            geofence_land_on: false,
            geofence_warning_action_on: false,
            geofence_violated_prev: false,
            arm_tune_played: false,
            last_tune: None,
            last_led: None,
            parachute_component_id,
            should_exit: false,
            time,
            topics,
            store,
            power_button,
        };

        commander.apply_params();
        commander.status.boot_timestamp = boot_timestamp;
        commander
    }

    pub fn status(&self) -> &VehicleStatus {
        &self.status
    }

    pub fn status_flags(&self) -> &StatusFlags {
        &self.flags
    }

    pub fn actuator_armed(&self) -> &ActuatorArmed {
        &self.armed
    }

    pub fn internal_state(&self) -> &CommanderState {
        &self.internal
    }

    pub fn is_armed(&self) -> bool {
        self.arm_state_machine.is_armed()
    }

    pub fn home_valid(&self) -> bool {
        self.home.valid()
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Cooperative exit request; honored at the next tick boundary.
    pub fn request_exit(&mut self) {
        self.should_exit = true;
    }

    fn apply_params(&mut self) {
        self.status.system_id = self.params.mav_sys_id;
        self.status.component_id = self.params.mav_comp_id;
        self.auto_disarm.set_kill_timeout(self.params.com_kill_disarm);
        self.offboard_available
            .set_hysteresis_time_from(true, (self.params.com_of_loss_t.max(0.0) * 1e6) as u64);
        let fd_params = FailureDetectorParams::from_store(&self.store.borrow());
        self.failure_detector.set_params(fd_params);
    }

    /// One pass of the supervisory loop.
    pub fn tick(&mut self) {
        let now = self.time.now_us();
        let actuator_armed_prev = self.armed;

        // Parameters are only re-read while disarmed.
        if self.parameter_update_sub.updated() {
            self.parameter_update_sub.copy();
            if !self.arm_state_machine.is_armed() {
                self.params = CommanderParams::from_store(&self.store.borrow());
                self.apply_params();
                self.status_changed = true;
            }
        }

        self.handle_power_button(now);
        self.offboard_control_update(now);
        self.system_power_update(now);
        self.land_detector_update(now);
        self.safety_update();
        self.vtol_status_update();
        self.estimator_flags_update();

        self.flags.home_position_valid = self.home.valid();

        self.handle_auto_disarm(now);

        // reset the geofence latch once the operator left the action mode
        if self.geofence_warning_action_on
            && !matches!(
                self.internal.main_state,
                MainState::AutoRtl | MainState::AutoLoiter | MainState::AutoLand
            )
        {
            self.geofence_warning_action_on = false;
        }

        self.battery_status_check(now);

        // From INIT, keep trying to reach STANDBY.
        if !self.flags.calibration_enabled && self.arm_state_machine.is_init() {
            self.health_checks.update(&self.status, &self.flags);
            self.arm_state_machine.arming_state_transition(
                &mut self.status,
                &mut self.armed,
                &self.health_checks,
                ArmingState::Standby,
                true,
                ArmDisarmReason::TransitionToStandby,
                now,
                &mut self.events,
            );
        }

        self.check_for_mission_update();
        self.geofence_actions(now);
        self.manual_control_check(now);
        self.data_link_check(now);

        // Disarmed with no RC and no operator mode choice yet: wait in hold
        // so a GCS-only operator can take over.
        if !self.arm_state_machine.is_armed()
            && self.status.rc_signal_lost
            && self.internal.main_state_changes == 0
            && self.flags.global_position_valid
        {
            main_state_transition(
                &self.status,
                MainState::AutoLoiter,
                &self.flags,
                &mut self.internal,
            );
        }

        // Commands last, so they see fully updated state. At most one of
        // each per tick.
        if self.vehicle_command_sub.updated() {
            if self.vehicle_command_sub.missed() > 0 {
                self.events.push(
                    "commander_vehicle_command_lost",
                    Severity::Warning,
                    "vehicle_command generations lost",
                );
            }
            if let Some(cmd) = self.vehicle_command_sub.copy() {
                if self.handle_command(&cmd, now) {
                    self.status_changed = true;
                }
            }
        }
        if let Some(request) = self.topics.action_request.pop() {
            self.execute_action_request(&request, now);
        }

        self.failure_detector_update(now);
        self.wind_check(now);
        self.flight_time_check(now);
        self.arming_edge_bookkeeping(now);

        // Resolve the navigation state.
        let conditions = FailsafeConditions {
            landed: self.land_detected.landed,
            mission_flight_termination: self.mission_result.flight_termination,
            data_link_loss_act: self.params.nav_dll_act,
            rc_loss_act: self.params.nav_rcl_act,
            rcl_except: self.params.com_rcl_except,
            offboard_loss_act: self.params.com_obl_act,
            offboard_loss_rc_act: self.params.com_obl_rc_act,
            quadchute_act: self.params.com_qc_act,
            flight_termination_disabled: self.params.flight_termination_disabled(),
        };
        let nav_result = failsafe::set_nav_state(
            &mut self.status,
            &self.armed,
            &self.internal,
            &self.flags,
            &conditions,
        );
        if nav_result.changed {
            self.status.nav_state_timestamp = now;
        }

        if self.status.failsafe != self.failsafe_old {
            self.status_changed = true;
            if self.status.failsafe {
                self.events.push(
                    nav_result.cause.event_id(),
                    Severity::Warning,
                    "Failsafe mode activated",
                );
            } else {
                self.events.push(
                    "commander_failsafe_deactivated",
                    Severity::Info,
                    "Failsafe mode deactivated",
                );
            }
            self.failsafe_old = self.status.failsafe;
        }

        self.armed
            .set(ActuatorArmedFlags::PREARMED, self.prearm_state());

        // Publish at 2 Hz or immediately on change.
        let due = now.saturating_sub(self.last_publish) >= PUBLISH_INTERVAL_US;
        if due || self.status_changed || nav_result.changed
            || !self.armed.same_state(&actuator_armed_prev)
        {
            self.publish_outputs(&actuator_armed_prev, now);
            self.last_publish = now;
        }

        self.check_worker_thread();
        self.update_tunes();
        self.update_leds();
        self.drain_events();

        self.status_changed = false;
        self.was_armed = self.arm_state_machine.is_armed();
    }

    /// Whether the tick loop may sleep for the full monitoring interval.
    pub fn has_pending_work(&self) -> bool {
        self.vehicle_command_sub.updated() || self.topics.action_request.has_pending()
    }

    // ---- input folding -------------------------------------------------

    fn handle_power_button(&mut self, now: u64) {
        while let Some(event) = self.power_button.dequeue() {
            match event {
                PowerButtonEvent::ShutdownRequest => {
                    if self.shutdown_if_allowed(now) {
                        self.events.push(
                            "commander_shutdown",
                            Severity::Info,
                            "Shutting down by power button request",
                        );
                        self.home.invalidate();
                        self.should_exit = true;
                    }
                }
            }
        }
    }

    fn offboard_control_update(&mut self, now: u64) {
        if self.offboard_sub.updated() {
            if let Some(ocm) = self.offboard_sub.copy() {
                if ocm != self.offboard_mode {
                    self.status_changed = true;
                }
                self.offboard_mode = ocm;
            }
        }

        let mut available = self.offboard_mode.any_active()
            && now.saturating_sub(self.offboard_mode.timestamp)
                < (self.params.com_of_loss_t.max(0.0) * 1e6) as u64 + COMMANDER_MONITORING_INTERVAL_US;

        if self.offboard_mode.position && !self.flags.local_position_valid {
            available = false;
        } else if self.offboard_mode.velocity && !self.flags.local_velocity_valid {
            available = false;
        } else if self.offboard_mode.acceleration && !self.flags.local_velocity_valid {
            available = false;
        }

        self.offboard_available.set_state_and_update(available, now);
        let lost = !self.offboard_available.get_state();
        if self.flags.offboard_control_signal_lost != lost {
            self.flags.offboard_control_signal_lost = lost;
            self.status_changed = true;
        }
    }

    fn system_power_update(&mut self, now: u64) {
        if let Some(power) = self.system_power_sub.copy() {
            if now.saturating_sub(power.timestamp) < 1_000_000 {
                // flying on the servo rail alone is unsafe
                self.status.power_input_valid =
                    power.brick_valid || power.usb_connected || !power.servo_valid;
                if power.usb_connected {
                    self.status.usb_connected = true;
                }
            }
        }
    }

    fn land_detector_update(&mut self, now: u64) {
        if !self.land_detected_sub.updated() {
            return;
        }
        let was_landed = self.land_detected.landed;
        if !self.land_detected_sub.update(&mut self.land_detected) {
            return;
        }

        if self.arm_state_machine.is_armed() {
            if !was_landed && self.land_detected.landed {
                self.events
                    .push("commander_landing_detected", Severity::Info, "Landing detected");
                self.status.takeoff_time = 0;
            } else if was_landed && !self.land_detected.landed {
                self.events
                    .push("commander_takeoff_detected", Severity::Info, "Takeoff detected");
                self.status.takeoff_time = now;
                self.have_taken_off_since_arming = true;
            }

            // set home on the takeoff edge, refresh in air if configured
            if self.params.com_home_en
                && !self.land_detected.landed
                && now.saturating_sub(self.boot_timestamp) > INAIR_RESTART_HOLDOFF_US
            {
                if was_landed {
                    self.home
                        .set_home_position(&self.global_position, self.local_position.heading, now);
                } else if self.params.com_home_in_air {
                    self.home.set_in_air_home_position(
                        &self.global_position,
                        self.local_position.heading,
                        now,
                    );
                }
                self.publish_home(now);
            }
        }
    }

    fn safety_update(&mut self) {
        if let Some(safety) = self.safety_sub.copy() {
            if self.status.safety_button_available != safety.button_available
                || self.status.safety_off != safety.off
            {
                self.status.safety_button_available = safety.button_available;
                self.status.safety_off = safety.off;
                self.status_changed = true;
                if safety.off {
                    self.set_tune(TuneId::NotifyPositive, false);
                } else {
                    self.set_tune(TuneId::NotifyNeutral, false);
                }
            }
        }
    }

    fn vtol_status_update(&mut self) {
        if !self.vtol_sub.updated() {
            return;
        }
        if !self.vtol_sub.update(&mut self.vtol_status) || !self.status.is_vtol {
            return;
        }

        let new_type = if self.vtol_status.vtol_state == VtolState::Fw {
            crate::status::VehicleType::FixedWing
        } else {
            crate::status::VehicleType::RotaryWing
        };
        if new_type != self.status.vehicle_type {
            self.status.vehicle_type = new_type;
            self.status_changed = true;
        }

        let in_transition = matches!(
            self.vtol_status.vtol_state,
            VtolState::TransitionToFw | VtolState::TransitionToMc
        );
        if self.status.in_transition_mode != in_transition {
            self.status.in_transition_mode = in_transition;
            self.status_changed = true;
        }
        self.status.in_transition_to_fw = self.vtol_status.vtol_state == VtolState::TransitionToFw;

        if self.flags.vtol_transition_failure != self.vtol_status.transition_failsafe {
            self.flags.vtol_transition_failure = self.vtol_status.transition_failsafe;
            self.status_changed = true;
        }
    }

    fn estimator_flags_update(&mut self) {
        self.global_position_sub.update(&mut self.global_position);
        self.local_position_sub.update(&mut self.local_position);
        self.gps_sub.update(&mut self.gps_position);
        self.cpu_load_sub.update(&mut self.cpu_load);
        self.fd_input_sub.update(&mut self.fd_input);

        let flags = &mut self.flags;
        flags.gps_valid = self.gps_position.fix >= GpsFix::Fix3D;
        flags.global_position_valid = self.global_position.valid;
        flags.local_position_valid = self.local_position.xy_valid;
        flags.local_altitude_valid = self.local_position.z_valid;
        flags.local_velocity_valid = self.local_position.v_xy_valid;

        if let Some(battery) = self.battery_sub.copy() {
            flags.battery_warning = battery.warning;
            flags.battery_low_remaining_time = battery.low_remaining_time;
        }
    }

    // ---- periodic checks -----------------------------------------------

    fn handle_auto_disarm(&mut self, now: u64) {
        if !self.arm_state_machine.is_armed() {
            self.auto_disarm.reset(now);
            return;
        }

        if self.params.com_disarm_land > 0.0 || self.params.com_disarm_preflight > 0.0 {
            let landed_amid_mission = self.status.nav_state == NavState::AutoMission
                && !self.mission_result.finished;

            let event = if self.params.com_disarm_land > 0.0
                && self.have_taken_off_since_arming
                && !landed_amid_mission
            {
                self.auto_disarm.set_land_timeout(self.params.com_disarm_land);
                self.auto_disarm
                    .update_landed(self.land_detected.landed, true, now)
            } else if self.params.com_disarm_preflight > 0.0 && !self.have_taken_off_since_arming {
                self.auto_disarm
                    .set_land_timeout(self.params.com_disarm_preflight);
                self.auto_disarm.update_landed(true, false, now)
            } else {
                None
            };

            match event {
                Some(AutoDisarmEvent::Landed) => {
                    self.disarm(ArmDisarmReason::AutoDisarmLand, false, now);
                }
                Some(AutoDisarmEvent::Preflight) => {
                    self.disarm(ArmDisarmReason::AutoDisarmPreflight, false, now);
                }
                _ => {}
            }
        }

        match self
            .auto_disarm
            .update_killed(self.armed.manual_lockdown(), self.armed.lockdown(), now)
        {
            Some(AutoDisarmEvent::KillSwitch) => {
                self.disarm(ArmDisarmReason::KillSwitch, true, now);
            }
            Some(AutoDisarmEvent::Lockdown) => {
                self.disarm(ArmDisarmReason::Lockdown, true, now);
            }
            _ => {}
        }
    }

    fn battery_status_check(&mut self, now: u64) {
        let in_return_or_land = matches!(
            self.internal.main_state,
            MainState::AutoRtl | MainState::AutoLand
        );
        let update = self.battery_monitor.update(
            self.flags.battery_warning,
            self.flags.battery_low_remaining_time,
            self.arm_state_machine.is_armed(),
            self.land_detected.ground_contact,
            in_return_or_land,
            now,
        );

        if update.remaining_time_low {
            if main_state_transition(
                &self.status,
                MainState::AutoRtl,
                &self.flags,
                &mut self.internal,
            ) == TransitionResult::Changed
            {
                self.events.push(
                    "commander_remaining_flight_time_rtl",
                    Severity::Critical,
                    "Remaining flight time low, returning to land",
                );
            } else {
                self.events.push(
                    "commander_remaining_flight_time_land",
                    Severity::Critical,
                    "Remaining flight time low, land now!",
                );
            }
        }

        if update.escalated {
            self.events.push(
                "commander_battery_warning",
                Severity::Critical,
                "Battery level degraded while armed",
            );
            self.status_changed = true;

            // wait out the reaction delay in hold
            if self.params.com_bat_act_t > 0.0
                && battery_failsafe_action(
                    self.battery_monitor.warning(),
                    self.params.com_low_bat_act,
                )
                .is_some()
            {
                main_state_transition(
                    &self.status,
                    MainState::AutoLoiter,
                    &self.flags,
                    &mut self.internal,
                );
            }

            if update.emergency {
                // attempt a platform shutdown after the warning
                if self.shutdown_if_allowed(now) {
                    self.events.push(
                        "commander_low_bat_shutdown",
                        Severity::Emergency,
                        "Dangerously low battery! Shutting system down",
                    );
                    self.should_exit = true;
                } else {
                    self.events.push(
                        "commander_low_bat_shutdown_failed",
                        Severity::Emergency,
                        "Dangerously low battery! System shut down failed",
                    );
                }
            }
        }

        let in_hold_or_auto = self.internal.main_state == MainState::AutoLoiter
            || self.control_mode.flag_control_auto_enabled;
        if let Some(action) = self.battery_monitor.take_delayed_action(
            self.params.com_low_bat_act,
            self.params.com_bat_act_t,
            in_hold_or_auto,
            now,
        ) {
            self.internal.main_state = action;
            self.internal.main_state_changes += 1;
            self.internal.timestamp = now;
            self.status_changed = true;
        }
    }

    fn check_for_mission_update(&mut self) {
        if !self.mission_result_sub.updated() {
            return;
        }
        let previous = self.mission_result;
        if !self.mission_result_sub.update(&mut self.mission_result) {
            return;
        }

        self.status.auto_mission_available = self.mission_result.valid;

        if self.arm_state_machine.is_armed() && !self.land_detected.landed {
            // takeoff completion hands over to hold
            if self.internal.main_state == MainState::AutoTakeoff
                && self.mission_result.finished
            {
                main_state_transition(
                    &self.status,
                    MainState::AutoLoiter,
                    &self.flags,
                    &mut self.internal,
                );
            }
        }

        if previous.instance_count != self.mission_result.instance_count {
            self.status_changed = true;
        }
    }

    fn geofence_actions(&mut self, now: u64) {
        if self.geofence_result_sub.updated() {
            if self.geofence_result_sub.update(&mut self.geofence_result) {
                self.status.geofence_violated = self.geofence_result.violated;
            }
        }

        let in_low_battery_delay = self.battery_monitor.in_action_delay();

        if self.arm_state_machine.is_armed()
            && self.geofence_result.action != GeofenceAction::None
            && !in_low_battery_delay
        {
            if self.geofence_result.violated && !self.geofence_violated_prev {
                match self.geofence_result.action {
                    GeofenceAction::None | GeofenceAction::Warn => {
                        // the navigator reports the warning
                    }
                    GeofenceAction::Loiter => {
                        if main_state_transition(
                            &self.status,
                            MainState::AutoLoiter,
                            &self.flags,
                            &mut self.internal,
                        ) == TransitionResult::Changed
                        {
                            self.geofence_loiter_on = true;
                        }
                    }
                    GeofenceAction::ReturnToLaunch => {
                        if main_state_transition(
                            &self.status,
                            MainState::AutoRtl,
                            &self.flags,
                            &mut self.internal,
                        ) == TransitionResult::Changed
                        {
                            self.geofence_rtl_on = true;
                        }
                    }
                    GeofenceAction::Land => {
                        if main_state_transition(
                            &self.status,
                            MainState::AutoLand,
                            &self.flags,
                            &mut self.internal,
                        ) == TransitionResult::Changed
                        {
                            self.geofence_land_on = true;
                        }
                    }
                    GeofenceAction::Terminate => {
                        if !self.flight_termination_triggered && !self.lockdown_triggered {
                            self.flight_termination_triggered = true;
                            self.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, true);
                            self.events.push(
                                "commander_geofence_termination",
                                Severity::Emergency,
                                "Geofence violation! Flight terminated",
                            );
                            self.status_changed = true;
                            self.send_parachute_command(now);
                        }
                    }
                }
            }

            self.geofence_violated_prev = self.geofence_result.violated;

            // one-shot: reset only when the operator leaves the action mode
            if self.internal.main_state != MainState::AutoLoiter {
                self.geofence_loiter_on = false;
            }
            if self.internal.main_state != MainState::AutoRtl {
                self.geofence_rtl_on = false;
            }
            if self.internal.main_state != MainState::AutoLand {
                self.geofence_land_on = false;
            }

            self.geofence_warning_action_on = self.geofence_warning_action_on
                || self.geofence_loiter_on
                || self.geofence_rtl_on
                || self.geofence_land_on;
        } else {
            self.geofence_loiter_on = false;
            self.geofence_rtl_on = false;
            self.geofence_land_on = false;
            self.geofence_warning_action_on = false;
            self.geofence_violated_prev = false;
        }
    }

    fn manual_control_check(&mut self, now: u64) {
        let updated = self.manual_control_sub.updated();
        if updated {
            self.manual_control_sub.update(&mut self.manual_control);
        }

        if updated && self.manual_control.valid {
            if !self.flags.rc_signal_found_once {
                self.flags.rc_signal_found_once = true;
            } else if self.status.rc_signal_lost && self.last_valid_manual_control > 0 {
                self.events.push(
                    "commander_rc_regained",
                    Severity::Info,
                    "Manual control regained",
                );
            }

            if self.status.rc_signal_lost {
                self.status.rc_signal_lost = false;
                self.status_changed = true;
            }

            self.last_valid_manual_control = self.manual_control.timestamp;
            self.is_throttle_above_center = self.manual_control.z > 0.6;
            self.is_throttle_low = self.manual_control.z < 0.1;

            if self.arm_state_machine.is_armed() {
                self.stick_takeover_check();
            } else {
                // initial mode install for GCS-only operators
                let is_mavlink = self.manual_control.source
                    != crate::status::ManualControlSource::Rc;
                if self.internal.main_state_changes == 0 && is_mavlink {
                    self.internal.main_state = MainState::Posctl;
                    self.internal.main_state_changes += 1;
                }
            }
        } else if (updated && !self.manual_control.valid)
            || (self.last_valid_manual_control > 0
                && now.saturating_sub(self.last_valid_manual_control)
                    > (self.params.com_rc_loss_t.max(0.0) * 1e6) as u64)
        {
            if !self.status.rc_signal_lost {
                self.status.rc_signal_lost = true;
                self.status_changed = true;
                self.events.push(
                    "commander_rc_lost",
                    Severity::Critical,
                    "Manual control lost",
                );
            }
        }
    }

    fn stick_takeover_check(&mut self) {
        const AUTO_MODE_BIT: i32 = 1;
        const OFFBOARD_MODE_BIT: i32 = 2;

        if !self.manual_control.sticks_moving
            || self.control_mode.flag_control_manual_enabled
            || !self.status.is_rotary_wing()
        {
            return;
        }

        let mut override_enabled = false;
        if self.control_mode.flag_control_auto_enabled
            && self.params.com_rc_override & AUTO_MODE_BIT != 0
        {
            override_enabled = true;
        }
        if self.control_mode.flag_control_offboard_enabled
            && self.params.com_rc_override & OFFBOARD_MODE_BIT != 0
        {
            override_enabled = true;
        }

        if !override_enabled
            || self.battery_monitor.in_action_delay()
            || self.geofence_warning_action_on
        {
            return;
        }

        match main_state_transition(
            &self.status,
            MainState::Posctl,
            &self.flags,
            &mut self.internal,
        ) {
            TransitionResult::Changed => {
                self.set_tune(TuneId::NotifyPositive, false);
                self.events.push(
                    "commander_rc_override",
                    Severity::Info,
                    "Pilot took over control using sticks",
                );
                self.status_changed = true;
            }
            _ => {}
        }
    }

    fn data_link_check(&mut self, now: u64) {
        while let Some(telemetry) = self.topics.telemetry_status.pop() {
            self.link_monitor
                .process_telemetry(&telemetry, &mut self.status, &mut self.events);
        }

        if self.iridium_sub.updated() {
            if let Some(iridium) = self.iridium_sub.copy() {
                self.link_monitor.process_iridium(
                    &iridium,
                    (self.params.com_hldl_reg_t.max(0.0) * 1e6) as u64,
                    &mut self.status,
                    now,
                );
            }
        }

        let timeouts = LinkTimeouts {
            gcs_loss_us: (self.params.com_dl_loss_t.max(0.0) * 1e6) as u64,
            onboard_loss_us: (self.params.com_obc_loss_t.max(0.0) * 1e6) as u64,
            high_latency_loss_us: (self.params.com_hldl_loss_t.max(0.0) * 1e6) as u64,
            high_latency_regain_us: (self.params.com_hldl_reg_t.max(0.0) * 1e6) as u64,
        };
        let events_before = self.events.len();
        self.link_monitor
            .check_timeouts(&timeouts, &mut self.status, &mut self.events, now);
        if self.events.len() != events_before {
            self.status_changed = true;
        }
    }

    fn failure_detector_update(&mut self, now: u64) {
        let motor_failure_before = self
            .failure_detector
            .flags()
            .contains(FailureFlags::MOTOR);

        if !self
            .failure_detector
            .update(&self.fd_input, self.arm_state_machine.is_armed(), now)
        {
            return;
        }
        self.status_changed = true;

        let flags = self.failure_detector.flags();

        if self.arm_state_machine.is_armed() {
            if flags.contains(FailureFlags::ARM_ESCS)
                && now.saturating_sub(self.status.armed_time)
                    < (self.params.com_spoolup_time.max(0.0) * 1e6) as u64
            {
                self.disarm(ArmDisarmReason::FailureDetector, false, now);
                self.events.push(
                    "commander_fd_escs_not_arming",
                    Severity::Critical,
                    "ESCs did not respond to arm request",
                );
            }

            if flags.intersects(
                FailureFlags::ROLL | FailureFlags::PITCH | FailureFlags::ALT | FailureFlags::EXT,
            ) {
                let right_after_takeoff = now.saturating_sub(self.status.takeoff_time)
                    < (self.params.com_lkdown_tko.max(0.0) * 1e6) as u64;

                if right_after_takeoff && !self.lockdown_triggered {
                    self.armed.set(ActuatorArmedFlags::LOCKDOWN, true);
                    self.lockdown_triggered = true;
                    self.events.push(
                        "commander_fd_lockdown",
                        Severity::Emergency,
                        "Critical failure detected: lockdown",
                    );
                } else if !self.params.flight_termination_disabled()
                    && !self.flight_termination_triggered
                    && !self.lockdown_triggered
                {
                    self.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, true);
                    self.flight_termination_triggered = true;
                    self.events.push(
                        "commander_fd_terminate",
                        Severity::Emergency,
                        "Critical failure detected: terminate flight",
                    );
                    self.send_parachute_command(now);
                }
            }

            if flags.contains(FailureFlags::IMBALANCED_PROP)
                && !self.imbalanced_prop_check_triggered
            {
                self.imbalanced_prop_check_triggered = true;
                self.imbalanced_prop_failsafe();
            }
        }

        // one-time reactions to the motor-failure edge
        let motor_failure = flags.contains(FailureFlags::MOTOR);
        if motor_failure != motor_failure_before {
            if motor_failure {
                self.events.push(
                    "commander_motor_failure",
                    Severity::Emergency,
                    "Motor failure! Land immediately",
                );
            } else {
                self.events.push(
                    "commander_motor_recovered",
                    Severity::Warning,
                    "Motor recovered, landing still advised",
                );
            }
        }

        if motor_failure && !motor_failure_before {
            use crate::failsafe::ActuatorFailureAction;
            match self.params.com_act_fail_act {
                ActuatorFailureAction::Hold => {
                    main_state_transition(
                        &self.status,
                        MainState::AutoLoiter,
                        &self.flags,
                        &mut self.internal,
                    );
                }
                ActuatorFailureAction::Land => {
                    main_state_transition(
                        &self.status,
                        MainState::AutoLand,
                        &self.flags,
                        &mut self.internal,
                    );
                }
                ActuatorFailureAction::ReturnToLaunch => {
                    main_state_transition(
                        &self.status,
                        MainState::AutoRtl,
                        &self.flags,
                        &mut self.internal,
                    );
                }
                ActuatorFailureAction::Terminate => {
                    if !self.armed.manual_lockdown() {
                        self.armed.set(ActuatorArmedFlags::MANUAL_LOCKDOWN, true);
                        self.events.push(
                            "commander_act_failure_term",
                            Severity::Emergency,
                            "Flight termination due to actuator failure",
                        );
                        self.send_parachute_command(now);
                    }
                }
                ActuatorFailureAction::Warn => {}
            }
        }
    }

    fn imbalanced_prop_failsafe(&mut self) {
        use crate::failsafe::ImbalancedPropAction;
        match self.params.com_imb_prop_act {
            ImbalancedPropAction::Warn => {
                self.events.push(
                    "commander_imbalanced_prop",
                    Severity::Warning,
                    "Imbalanced propeller detected, landing advised",
                );
            }
            ImbalancedPropAction::ReturnToLaunch => {
                main_state_transition(
                    &self.status,
                    MainState::AutoRtl,
                    &self.flags,
                    &mut self.internal,
                );
            }
            ImbalancedPropAction::Land => {
                main_state_transition(
                    &self.status,
                    MainState::AutoLand,
                    &self.flags,
                    &mut self.internal,
                );
            }
        }
    }

    fn wind_check(&mut self, now: u64) {
        if self.land_detected.landed {
            return;
        }
        if self.params.com_wind_warn <= 0.0 && self.params.com_wind_max <= 0.0 {
            return;
        }

        if self.wind_sub.updated() {
            if let Some(wind) = self.wind_sub.copy() {
                let in_return_or_land = matches!(
                    self.internal.main_state,
                    MainState::AutoRtl | MainState::AutoLand
                );
                match self.wind_monitor.update(
                    &wind,
                    self.params.com_wind_warn,
                    self.params.com_wind_max,
                    in_return_or_land,
                    now,
                ) {
                    WindAction::Warn => {
                        self.events.push(
                            "commander_high_wind_warning",
                            Severity::Warning,
                            "High wind speed detected, landing advised",
                        );
                    }
                    WindAction::ReturnToLaunch => {
                        main_state_transition(
                            &self.status,
                            MainState::AutoRtl,
                            &self.flags,
                            &mut self.internal,
                        );
                        self.status_changed = true;
                        self.events.push(
                            "commander_high_wind_rtl",
                            Severity::Warning,
                            "Wind speeds above limit, abort operation and RTL",
                        );
                    }
                    WindAction::None => {}
                }
            }
        }
    }

    fn flight_time_check(&mut self, now: u64) {
        // The operator cannot override the max-flight-time return except by
        // landing.
        if !self.land_detected.landed
            && self.params.com_flt_time_max > 0.0
            && self.status.takeoff_time != 0
            && !matches!(
                self.internal.main_state,
                MainState::AutoRtl | MainState::AutoLand
            )
            && now.saturating_sub(self.status.takeoff_time)
                > (self.params.com_flt_time_max * 1e6) as u64
        {
            main_state_transition(
                &self.status,
                MainState::AutoRtl,
                &self.flags,
                &mut self.internal,
            );
            self.status_changed = true;
            self.events.push(
                "commander_max_flight_time_rtl",
                Severity::Critical,
                "Maximum flight time reached, abort operation and RTL",
            );
        }
    }

    fn arming_edge_bookkeeping(&mut self, now: u64) {
        let is_armed = self.arm_state_machine.is_armed();

        if self.was_armed != is_armed {
            self.status_changed = true;
        }

        if !self.was_armed && is_armed && !self.land_detected.landed {
            self.have_taken_off_since_arming = true;
        }

        if self.was_armed && !is_armed {
            // flight is over: bump the flight counter without notifying
            let uuid = self.store.borrow().get_int("COM_FLIGHT_UUID", 0) + 1;
            let _ = self
                .store
                .borrow_mut()
                .set_no_notification("COM_FLIGHT_UUID", ParamValue::Int(uuid));
            self.params.com_flight_uuid = uuid;

            self.last_disarmed_timestamp = now;

            // after an autonomous landing, park in hold
            if self.control_mode.flag_control_auto_enabled {
                main_state_transition(
                    &self.status,
                    MainState::AutoLoiter,
                    &self.flags,
                    &mut self.internal,
                );
            }
        }

        if !is_armed {
            self.have_taken_off_since_arming = false;
            self.imbalanced_prop_check_triggered = false;
        }
    }

    // ---- arming entry points -------------------------------------------

    /// Arm the vehicle, applying the mode-level gates.
    pub fn arm(
        &mut self,
        reason: ArmDisarmReason,
        mut run_preflight_checks: bool,
        now: u64,
    ) -> TransitionResult {
        // grace period for accidental in-air disarm
        if reason == ArmDisarmReason::RcSwitch
            && self.last_disarmed_timestamp != 0
            && now.saturating_sub(self.last_disarmed_timestamp) < REARM_GRACE_PERIOD_US
        {
            run_preflight_checks = false;
        }

        if run_preflight_checks && !self.arm_state_machine.is_armed() {
            if self.control_mode.flag_control_manual_enabled {
                if self.control_mode.flag_control_climb_rate_enabled
                    && !self.status.rc_signal_lost
                    && self.is_throttle_above_center
                {
                    self.events.push(
                        "commander_arm_denied_throttle_center",
                        Severity::Critical,
                        "Arming denied: throttle above center",
                    );
                    self.set_tune(TuneId::NotifyNegative, true);
                    return TransitionResult::Denied;
                }
                if !self.control_mode.flag_control_climb_rate_enabled
                    && !self.status.rc_signal_lost
                    && !self.is_throttle_low
                    && !self.status.is_ground_vehicle()
                {
                    self.events.push(
                        "commander_arm_denied_throttle_high",
                        Severity::Critical,
                        "Arming denied: high throttle",
                    );
                    self.set_tune(TuneId::NotifyNegative, true);
                    return TransitionResult::Denied;
                }
            } else if reason.is_rc() {
                self.events.push(
                    "commander_arm_denied_not_manual",
                    Severity::Critical,
                    "Arming denied: switch to manual mode first",
                );
                self.set_tune(TuneId::NotifyNegative, true);
                return TransitionResult::Denied;
            }

            if self.geofence_result.action == GeofenceAction::ReturnToLaunch
                && !self.flags.home_position_valid
            {
                self.events.push(
                    "commander_arm_denied_geofence_rtl",
                    Severity::Critical,
                    "Arming denied: Geofence RTL requires valid home",
                );
                self.set_tune(TuneId::NotifyNegative, true);
                return TransitionResult::Denied;
            }
        }

        self.health_checks.update(&self.status, &self.flags);
        let result = self.arm_state_machine.arming_state_transition(
            &mut self.status,
            &mut self.armed,
            &self.health_checks,
            ArmingState::Armed,
            run_preflight_checks,
            reason,
            now,
            &mut self.events,
        );

        match result {
            TransitionResult::Changed => {
                self.events
                    .push("commander_armed_by", Severity::Info, "Armed");
                self.status_changed = true;
            }
            TransitionResult::Denied => {
                self.set_tune(TuneId::NotifyNegative, true);
            }
            TransitionResult::NotChanged => {}
        }

        result
    }

    /// Disarm the vehicle; non-forced requests are refused in the air.
    pub fn disarm(
        &mut self,
        reason: ArmDisarmReason,
        forced: bool,
        now: u64,
    ) -> TransitionResult {
        if !forced {
            let landed = self.land_detected.landed
                || self.land_detected.maybe_landed
                || self.status.is_ground_vehicle();
            let mc_manual_thrust = self.status.is_rotary_wing()
                && self.control_mode.flag_control_manual_enabled
                && !self.control_mode.flag_control_climb_rate_enabled;

            if !landed && !(mc_manual_thrust && reason.is_rc()) {
                if reason != ArmDisarmReason::RcStick {
                    self.events.push(
                        "commander_disarming_denied_not_landed",
                        Severity::Critical,
                        "Disarming denied, not landed",
                    );
                }
                return TransitionResult::Denied;
            }
        }

        let result = self.arm_state_machine.arming_state_transition(
            &mut self.status,
            &mut self.armed,
            &self.health_checks,
            ArmingState::Standby,
            false,
            reason,
            now,
            &mut self.events,
        );

        match result {
            TransitionResult::Changed => {
                self.events
                    .push("commander_disarmed_by", Severity::Info, "Disarmed");
                self.status_changed = true;
            }
            TransitionResult::Denied => {
                self.set_tune(TuneId::NotifyNegative, true);
            }
            TransitionResult::NotChanged => {}
        }

        result
    }

    /// Probe the SHUTDOWN gate of the arm state machine.
    pub fn shutdown_if_allowed(&mut self, now: u64) -> bool {
        self.arm_state_machine.arming_state_transition(
            &mut self.status,
            &mut self.armed,
            &self.health_checks,
            ArmingState::Shutdown,
            false,
            ArmDisarmReason::Shutdown,
            now,
            &mut self.events,
        ) != TransitionResult::Denied
    }

    pub(crate) fn send_parachute_command(&mut self, now: u64) {
        let mut cmd = VehicleCommand::internal(command_ids::DO_PARACHUTE);
        cmd.param1 = PARACHUTE_ACTION_RELEASE;
        cmd.source_system = self.status.system_id;
        cmd.source_component = self.status.component_id;
        cmd.target_system = self.status.system_id;
        cmd.target_component = self.parachute_component_id;
        cmd.timestamp = now;
        self.topics.vehicle_command.publish(cmd);

        self.set_tune(TuneId::ParachuteRelease, true);
    }

    pub(crate) fn print_reject_mode(&mut self, now: u64) {
        if now.saturating_sub(self.last_mode_reject) > MODE_REJECT_INTERVAL_US {
            self.last_mode_reject = now;
            self.events.push(
                "commander_mode_rejected",
                Severity::Critical,
                "Switching mode not possible",
            );
            self.set_tune(TuneId::NotifyNegative, true);
        }
    }

    fn prearm_state(&self) -> bool {
        // 0 disabled, 1 safety switch, 2 always
        match self.params.com_prearm_mode {
            2 => true,
            1 => self.status.safety_off,
            _ => self.arm_state_machine.is_armed(),
        }
    }

    // ---- outputs -------------------------------------------------------

    fn publish_outputs(&mut self, actuator_armed_prev: &ActuatorArmed, now: u64) {
        // Re-evaluate the prearm status, skipping arm/disarm transitions
        // (the transition already ran the checks).
        if self.armed.armed() == actuator_armed_prev.armed() && !self.flags.calibration_enabled {
            self.health_checks.update(&self.status, &self.flags);
            self.flags.pre_flight_checks_pass = self.health_checks.can_arm(self.status.nav_state);
        }

        self.armed.set(
            ActuatorArmedFlags::READY_TO_ARM,
            self.arm_state_machine.is_armed() || self.arm_state_machine.is_standby(),
        );
        self.armed.timestamp = now;

        // actuator_armed strictly first so output modules observe a
        // consistent arm state.
        self.topics
            .actuator_armed
            .publish_ordered(self.armed, self.topics.next_order());

        self.control_mode = control_mode_for_nav_state(
            self.status.nav_state,
            self.armed.armed(),
            now,
        );
        self.topics
            .vehicle_control_mode
            .publish_ordered(self.control_mode, self.topics.next_order());

        self.status.arming_state = self.arm_state_machine.state();
        self.status.timestamp = now;
        self.topics
            .vehicle_status
            .publish_ordered(self.status, self.topics.next_order());

        self.flags.timestamp = now;
        self.topics
            .vehicle_status_flags
            .publish_ordered(self.flags, self.topics.next_order());

        self.internal.timestamp = now;
        self.topics
            .commander_state
            .publish_ordered(self.internal, self.topics.next_order());

        let mut fd_status = self.failure_detector.status();
        fd_status.timestamp = now;
        self.topics
            .failure_detector_status
            .publish_ordered(fd_status, self.topics.next_order());
    }

    pub(crate) fn publish_home(&mut self, _now: u64) {
        self.topics.home_position.publish(self.home.home());
    }

    fn check_worker_thread(&mut self) {
        if let Some(result) = self.worker.take_result() {
            self.armed
                .set(ActuatorArmedFlags::IN_ESC_CALIBRATION_MODE, false);

            if self.flags.calibration_enabled {
                self.flags.calibration_enabled = false;
                if result == 0 {
                    self.set_tune(TuneId::NotifyPositive, true);
                } else {
                    self.set_tune(TuneId::NotifyNegative, true);
                }
            }
        }
    }

    fn set_tune(&mut self, tune: TuneId, force: bool) {
        // the negative cue is suppressed during RC calibration
        if tune == TuneId::NotifyNegative && self.flags.rc_calibration_in_progress {
            return;
        }
        if !force && self.last_tune == Some(tune) {
            return;
        }
        self.last_tune = Some(tune);
        self.topics.tune_control.publish(TuneControl {
            tune,
            force,
            timestamp: self.time.now_us(),
        });
    }

    fn update_tunes(&mut self) {
        if !self.arm_tune_played && self.arm_state_machine.is_armed() {
            self.set_tune(TuneId::ArmingWarning, false);
            self.arm_tune_played = true;
        } else if !self.status.usb_connected
            && self.battery_monitor.warning() == crate::status::BatteryWarning::Critical
        {
            self.set_tune(TuneId::BatteryWarningFast, false);
        } else if self.battery_monitor.warning() == crate::status::BatteryWarning::Low {
            self.set_tune(TuneId::BatteryWarningSlow, false);
        }

        if !self.arm_state_machine.is_armed() && self.arm_tune_played {
            // safe to approach the vehicle
            self.set_tune(TuneId::NotifyNeutral, false);
            self.arm_tune_played = false;
        }
    }

    fn update_leds(&mut self) {
        let overloaded = self.cpu_load.load > OVERLOAD_CPU_LOAD;

        let led = if overloaded {
            LedControl {
                color: LedColor::Purple,
                mode: LedMode::BlinkFast,
                timestamp: 0,
            }
        } else if self.arm_state_machine.is_armed() {
            let color = if self.status.failsafe {
                LedColor::Purple
            } else {
                match self.battery_monitor.warning() {
                    crate::status::BatteryWarning::Low => LedColor::Amber,
                    crate::status::BatteryWarning::Critical
                    | crate::status::BatteryWarning::Emergency => LedColor::Red,
                    crate::status::BatteryWarning::None => LedColor::Green,
                }
            };
            LedControl {
                color,
                mode: LedMode::On,
                timestamp: 0,
            }
        } else if self.arm_state_machine.is_standby() {
            let color = if self.flags.home_position_valid && self.flags.global_position_valid {
                LedColor::Green
            } else {
                LedColor::Blue
            };
            LedControl {
                color,
                mode: LedMode::Breathe,
                timestamp: 0,
            }
        } else if self.arm_state_machine.state() == ArmingState::StandbyError {
            LedControl {
                color: LedColor::Red,
                mode: LedMode::BlinkFast,
                timestamp: 0,
            }
        } else {
            LedControl {
                color: LedColor::White,
                mode: LedMode::BlinkNormal,
                timestamp: 0,
            }
        };

        let changed = match self.last_led {
            Some(last) => last.color != led.color || last.mode != led.mode,
            None => true,
        };
        if changed {
            let mut stamped = led;
            stamped.timestamp = self.time.now_us();
            self.last_led = Some(stamped);
            self.topics.led_control.publish(stamped);
        }
    }

    fn drain_events(&mut self) {
        for event in self.events.events() {
            self.topics.event.publish(*event);
        }
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;

    use super::*;
    use crate::traits::MockTime;
    use heapless::spsc::Queue;

    fn make_commander(time: MockTime) -> Commander<'static, MockTime> {
        let topics: &'static Topics = Box::leak(Box::new(Topics::new()));
        let store: &'static RefCell<ParameterStore> =
            Box::leak(Box::new(RefCell::new(ParameterStore::new())));
        let queue: &'static mut Queue<PowerButtonEvent, 4> = Box::leak(Box::new(Queue::new()));
        let (_producer, consumer) = queue.split();
        Commander::new(time, topics, store, consumer, 161)
    }

    fn standby_commander() -> Commander<'static, MockTime> {
        let mut commander = make_commander(MockTime::with_initial(1_000_000));
        commander.arm_state_machine.force_state(ArmingState::Standby);
        commander.status.arming_state = ArmingState::Standby;
        commander
    }

    #[test]
    fn geofence_rtl_arming_requires_home() {
        let mut commander = standby_commander();
        commander.geofence_result.action = GeofenceAction::ReturnToLaunch;
        commander.flags.home_position_valid = false;

        let result = commander.arm(ArmDisarmReason::CommandInternal, true, 2_000_000);
        assert_eq!(result, TransitionResult::Denied);
        assert!(commander.events.contains("commander_arm_denied_geofence_rtl"));
        assert!(!commander.is_armed());

        // valid home clears the gate
        commander.events.clear();
        commander.flags.home_position_valid = true;
        let result = commander.arm(ArmDisarmReason::CommandInternal, true, 3_000_000);
        assert_eq!(result, TransitionResult::Changed);
        assert!(commander.is_armed());
    }

    #[test]
    fn arm_denied_with_throttle_above_center_in_climb_rate_mode() {
        let mut commander = standby_commander();
        commander.control_mode.flag_control_manual_enabled = true;
        commander.control_mode.flag_control_climb_rate_enabled = true;
        commander.status.rc_signal_lost = false;
        commander.is_throttle_above_center = true;

        let result = commander.arm(ArmDisarmReason::RcStick, true, 2_000_000);
        assert_eq!(result, TransitionResult::Denied);
        assert!(commander
            .events
            .contains("commander_arm_denied_throttle_center"));
    }

    #[test]
    fn rc_arm_requires_manual_mode() {
        let mut commander = standby_commander();
        // auto control mode active, RC switch attempts to arm
        commander.control_mode.flag_control_manual_enabled = false;
        commander.control_mode.flag_control_auto_enabled = true;

        let result = commander.arm(ArmDisarmReason::RcSwitch, true, 2_000_000);
        assert_eq!(result, TransitionResult::Denied);
        assert!(commander.events.contains("commander_arm_denied_not_manual"));

        // a command source is not bound by the manual-mode rule
        let result = commander.arm(ArmDisarmReason::CommandInternal, true, 3_000_000);
        assert_eq!(result, TransitionResult::Changed);
    }

    #[test]
    fn rc_switch_rearm_grace_skips_checks() {
        let mut commander = standby_commander();
        commander.last_disarmed_timestamp = 2_000_000;
        // make the checks fail
        commander.flags.battery_warning = crate::status::BatteryWarning::Critical;

        // within the 5 s grace window the checks are skipped
        let result = commander.arm(ArmDisarmReason::RcSwitch, true, 4_000_000);
        assert_eq!(result, TransitionResult::Changed);

        // outside the window the same attempt is denied
        let mut commander = standby_commander();
        commander.last_disarmed_timestamp = 2_000_000;
        commander.flags.battery_warning = crate::status::BatteryWarning::Critical;
        let result = commander.arm(ArmDisarmReason::RcSwitch, true, 8_000_000);
        assert_eq!(result, TransitionResult::Denied);
    }

    #[test]
    fn disarm_denied_in_air_for_command_sources() {
        let mut commander = standby_commander();
        commander.arm(ArmDisarmReason::CommandInternal, true, 2_000_000);
        commander.land_detected.landed = false;
        commander.land_detected.maybe_landed = false;

        let result = commander.disarm(ArmDisarmReason::CommandExternal, false, 3_000_000);
        assert_eq!(result, TransitionResult::Denied);
        assert!(commander
            .events
            .contains("commander_disarming_denied_not_landed"));

        // forced disarm always goes through
        let result = commander.disarm(ArmDisarmReason::CommandExternal, true, 4_000_000);
        assert_eq!(result, TransitionResult::Changed);
    }

    #[test]
    fn boot_tick_reaches_standby() {
        let time = MockTime::new();
        let mut commander = make_commander(time.clone());
        assert_eq!(commander.status().arming_state, ArmingState::Init);

        time.advance(COMMANDER_MONITORING_INTERVAL_US);
        commander.tick();
        assert_eq!(commander.status().arming_state, ArmingState::Standby);
    }

    #[test]
    fn shutdown_gate_follows_arm_state() {
        let mut commander = standby_commander();
        assert!(commander.shutdown_if_allowed(2_000_000));

        let mut commander = standby_commander();
        commander.arm(ArmDisarmReason::CommandInternal, true, 2_000_000);
        assert!(!commander.shutdown_if_allowed(3_000_000));
    }
}
