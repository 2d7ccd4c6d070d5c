//! Vehicle command dispatcher.
//!
//! Decodes external commands, invokes the state machines and answers with
//! exactly one ACK per handled command. Commands owned by other components
//! (navigator setpoint construction, VTOL transition logic) are left
//! un-acked here; their owners acknowledge them.

use super::Commander;
use crate::arming::TransitionResult;
use crate::events::Severity;
use crate::mode::main_state_transition;
use crate::status::command_ids::*;
use crate::status::{
    ActuatorArmedFlags, ArmDisarmReason, ArmingState, CommandAck, CommandResult, MainState,
    TuneId, VehicleCommand, ARMING_ACTION_ARM, ARMING_ACTION_DISARM, FORCE_ARMING_MAGIC,
    IN_AIR_RESTORE_MAGIC,
};
use crate::traits::TimeSource;

// MAV_MODE_FLAG base-mode bits (MAVLink spec).
const MODE_FLAG_CUSTOM_MODE_ENABLED: u8 = 1;
const MODE_FLAG_AUTO_ENABLED: u8 = 4;
const MODE_FLAG_GUIDED_ENABLED: u8 = 8;
const MODE_FLAG_STABILIZE_ENABLED: u8 = 16;
const MODE_FLAG_MANUAL_INPUT_ENABLED: u8 = 64;

// Autopilot-specific custom main modes.
const CUSTOM_MAIN_MODE_MANUAL: u8 = 1;
const CUSTOM_MAIN_MODE_ALTCTL: u8 = 2;
const CUSTOM_MAIN_MODE_POSCTL: u8 = 3;
const CUSTOM_MAIN_MODE_AUTO: u8 = 4;
const CUSTOM_MAIN_MODE_ACRO: u8 = 5;
const CUSTOM_MAIN_MODE_OFFBOARD: u8 = 6;
const CUSTOM_MAIN_MODE_STABILIZED: u8 = 7;

// Custom sub modes of CUSTOM_MAIN_MODE_AUTO.
const CUSTOM_SUB_MODE_AUTO_TAKEOFF: u8 = 2;
const CUSTOM_SUB_MODE_AUTO_LOITER: u8 = 3;
const CUSTOM_SUB_MODE_AUTO_MISSION: u8 = 4;
const CUSTOM_SUB_MODE_AUTO_RTL: u8 = 5;
const CUSTOM_SUB_MODE_AUTO_LAND: u8 = 6;
const CUSTOM_SUB_MODE_AUTO_FOLLOW_TARGET: u8 = 8;
const CUSTOM_SUB_MODE_AUTO_PRECLAND: u8 = 9;

impl<'t, T: TimeSource> Commander<'t, T> {
    /// Handle one pending command. Returns true when it was consumed here.
    pub(crate) fn handle_command(&mut self, cmd: &VehicleCommand, now: u64) -> bool {
        if !cmd.targets(self.status.system_id, self.status.component_id) {
            return false;
        }

        let result = match cmd.command {
            DO_REPOSITION => {
                // The navigator constructs the setpoint; only the optional
                // mode switch happens here.
                if (cmd.param2 as u32) & 1 != 0 {
                    match main_state_transition(
                        &self.status,
                        MainState::AutoLoiter,
                        &self.flags,
                        &mut self.internal,
                    ) {
                        TransitionResult::Denied => {
                            self.events.push(
                                "commander_reposition_rejected",
                                Severity::Critical,
                                "Reposition command rejected",
                            );
                            CommandResult::TemporarilyRejected
                        }
                        _ => CommandResult::Accepted,
                    }
                } else {
                    CommandResult::Accepted
                }
            }

            DO_SET_MODE => self.handle_set_mode(cmd),

            COMPONENT_ARM_DISARM => self.handle_arm_disarm(cmd, now),

            DO_FLIGHTTERMINATION => {
                if cmd.param1 > 1.5 {
                    // test termination: lockdown without force_failsafe
                    if !self.lockdown_triggered {
                        self.armed.set(ActuatorArmedFlags::LOCKDOWN, true);
                        self.lockdown_triggered = true;
                        self.events.push(
                            "commander_lockdown",
                            Severity::Warning,
                            "Forcing lockdown (motors off)",
                        );
                    }
                } else if cmd.param1 > 0.5 {
                    if !self.flight_termination_triggered {
                        self.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, true);
                        self.flight_termination_triggered = true;
                        self.events.push(
                            "commander_flight_termination",
                            Severity::Emergency,
                            "Forcing failsafe (termination)",
                        );
                        self.send_parachute_command(now);
                    }
                } else {
                    self.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, false);
                    self.armed.set(ActuatorArmedFlags::LOCKDOWN, false);
                    self.lockdown_triggered = false;
                    self.flight_termination_triggered = false;
                    self.events.push(
                        "commander_termination_cleared",
                        Severity::Warning,
                        "Disabling failsafe and lockdown",
                    );
                }
                CommandResult::Accepted
            }

            DO_SET_HOME => self.handle_set_home(cmd, now),

            NAV_RETURN_TO_LAUNCH => {
                if main_state_transition(
                    &self.status,
                    MainState::AutoRtl,
                    &self.flags,
                    &mut self.internal,
                ) == TransitionResult::Changed
                {
                    self.events
                        .push("commander_rtl", Severity::Info, "Returning to launch");
                    CommandResult::Accepted
                } else {
                    self.events.push(
                        "commander_rtl_denied",
                        Severity::Critical,
                        "Return to launch denied",
                    );
                    CommandResult::TemporarilyRejected
                }
            }

            NAV_TAKEOFF => {
                match main_state_transition(
                    &self.status,
                    MainState::AutoTakeoff,
                    &self.flags,
                    &mut self.internal,
                ) {
                    TransitionResult::Changed | TransitionResult::NotChanged => {
                        CommandResult::Accepted
                    }
                    TransitionResult::Denied => {
                        self.events.push(
                            "commander_takeoff_denied",
                            Severity::Critical,
                            "Takeoff denied! Check for a valid position estimate",
                        );
                        CommandResult::TemporarilyRejected
                    }
                }
            }

            NAV_VTOL_TAKEOFF => {
                match main_state_transition(
                    &self.status,
                    MainState::AutoVtolTakeoff,
                    &self.flags,
                    &mut self.internal,
                ) {
                    TransitionResult::Changed | TransitionResult::NotChanged => {
                        CommandResult::Accepted
                    }
                    TransitionResult::Denied => {
                        self.events.push(
                            "commander_vtol_takeoff_denied",
                            Severity::Critical,
                            "VTOL takeoff denied",
                        );
                        CommandResult::TemporarilyRejected
                    }
                }
            }

            NAV_LAND => {
                if main_state_transition(
                    &self.status,
                    MainState::AutoLand,
                    &self.flags,
                    &mut self.internal,
                ) != TransitionResult::Denied
                {
                    self.events.push(
                        "commander_landing_current_pos",
                        Severity::Info,
                        "Landing at current position",
                    );
                    CommandResult::Accepted
                } else {
                    self.events.push(
                        "commander_landing_denied",
                        Severity::Critical,
                        "Landing denied! Please land manually",
                    );
                    CommandResult::TemporarilyRejected
                }
            }

            NAV_PRECLAND => {
                if main_state_transition(
                    &self.status,
                    MainState::AutoPrecland,
                    &self.flags,
                    &mut self.internal,
                ) != TransitionResult::Denied
                {
                    self.events.push(
                        "commander_landing_prec_land",
                        Severity::Info,
                        "Landing using precision landing",
                    );
                    CommandResult::Accepted
                } else {
                    self.events.push(
                        "commander_landing_prec_land_denied",
                        Severity::Critical,
                        "Precision landing denied! Please land manually",
                    );
                    CommandResult::TemporarilyRejected
                }
            }

            MISSION_START => self.handle_mission_start(cmd, now),

            DO_ORBIT => {
                match main_state_transition(
                    &self.status,
                    MainState::Orbit,
                    &self.flags,
                    &mut self.internal,
                ) {
                    TransitionResult::Denied => CommandResult::TemporarilyRejected,
                    _ => CommandResult::Accepted,
                }
            }

            CONTROL_HIGH_LATENCY => CommandResult::Accepted,

            ACTUATOR_TEST => {
                if self.arm_state_machine.is_armed() {
                    CommandResult::Denied
                } else {
                    CommandResult::Accepted
                }
            }

            PREFLIGHT_REBOOT_SHUTDOWN => {
                // param1: 0 nothing, 1 reboot, 2 shutdown, 3 bootloader
                let request = cmd.param1 as i32;
                if request <= 0 {
                    CommandResult::Accepted
                } else if self.shutdown_if_allowed(now) {
                    self.events.push(
                        "commander_reboot_shutdown",
                        Severity::Info,
                        "Reboot/shutdown initiated",
                    );
                    self.should_exit = true;
                    CommandResult::Accepted
                } else {
                    CommandResult::Denied
                }
            }

            PREFLIGHT_CALIBRATION => self.handle_calibration(cmd),

            FIXED_MAG_CAL_YAW | PREFLIGHT_STORAGE => {
                if self.arm_state_machine.is_armed() {
                    CommandResult::Denied
                } else if self.worker.start() {
                    CommandResult::Accepted
                } else {
                    CommandResult::TemporarilyRejected
                }
            }

            RUN_PREARM_CHECKS => {
                self.health_checks.update(&self.status, &self.flags);
                self.flags.pre_flight_checks_pass =
                    self.health_checks.can_arm(self.status.nav_state);
                CommandResult::Accepted
            }

            START_RX_PAIR => {
                self.events.push(
                    "commander_rx_pair",
                    Severity::Info,
                    "RC receiver pairing started",
                );
                CommandResult::Accepted
            }

            SET_GPS_GLOBAL_ORIGIN => {
                if self.arm_state_machine.is_armed() {
                    CommandResult::Denied
                } else {
                    CommandResult::Accepted
                }
            }

            // Owned by other components; their owners acknowledge.
            DO_CHANGE_SPEED | DO_LAND_START | DO_GO_AROUND | DO_VTOL_TRANSITION | DO_SET_ROI
            | NAV_ROI | DO_SET_ROI_LOCATION | DO_SET_ROI_WPNEXT_OFFSET | DO_SET_ROI_NONE
            | DO_PARACHUTE => return false,

            _ => CommandResult::Unsupported,
        };

        self.answer_command(cmd, result, now);
        true
    }

    fn handle_set_mode(&mut self, cmd: &VehicleCommand) -> CommandResult {
        let base_mode = cmd.param1 as u8;
        let custom_main_mode = cmd.param2 as u8;
        let custom_sub_mode = cmd.param3 as u8;

        let desired = if base_mode & MODE_FLAG_CUSTOM_MODE_ENABLED != 0 {
            match custom_main_mode {
                CUSTOM_MAIN_MODE_MANUAL => Some(MainState::Manual),
                CUSTOM_MAIN_MODE_ALTCTL => Some(MainState::Altctl),
                CUSTOM_MAIN_MODE_POSCTL => Some(MainState::Posctl),
                CUSTOM_MAIN_MODE_ACRO => Some(MainState::Acro),
                CUSTOM_MAIN_MODE_OFFBOARD => Some(MainState::Offboard),
                CUSTOM_MAIN_MODE_STABILIZED => Some(MainState::Stab),
                CUSTOM_MAIN_MODE_AUTO => {
                    if custom_sub_mode > 0 {
                        match custom_sub_mode {
                            CUSTOM_SUB_MODE_AUTO_LOITER => Some(MainState::AutoLoiter),
                            CUSTOM_SUB_MODE_AUTO_MISSION => Some(MainState::AutoMission),
                            CUSTOM_SUB_MODE_AUTO_RTL => Some(MainState::AutoRtl),
                            CUSTOM_SUB_MODE_AUTO_TAKEOFF => Some(MainState::AutoTakeoff),
                            CUSTOM_SUB_MODE_AUTO_LAND => Some(MainState::AutoLand),
                            CUSTOM_SUB_MODE_AUTO_FOLLOW_TARGET => {
                                Some(MainState::AutoFollowTarget)
                            }
                            CUSTOM_SUB_MODE_AUTO_PRECLAND => Some(MainState::AutoPrecland),
                            _ => {
                                self.events.push(
                                    "commander_unsupported_auto_mode",
                                    Severity::Critical,
                                    "Unsupported auto mode",
                                );
                                return CommandResult::TemporarilyRejected;
                            }
                        }
                    } else {
                        Some(MainState::AutoMission)
                    }
                }
                _ => None,
            }
        } else if base_mode & MODE_FLAG_AUTO_ENABLED != 0 {
            Some(MainState::AutoMission)
        } else if base_mode & MODE_FLAG_MANUAL_INPUT_ENABLED != 0 {
            if base_mode & MODE_FLAG_GUIDED_ENABLED != 0 {
                Some(MainState::Posctl)
            } else if base_mode & MODE_FLAG_STABILIZE_ENABLED != 0 {
                Some(MainState::Stab)
            } else {
                Some(MainState::Manual)
            }
        } else {
            None
        };

        match desired {
            Some(state) => {
                match main_state_transition(&self.status, state, &self.flags, &mut self.internal)
                {
                    TransitionResult::Denied => CommandResult::TemporarilyRejected,
                    _ => CommandResult::Accepted,
                }
            }
            None => CommandResult::TemporarilyRejected,
        }
    }

    fn handle_arm_disarm(&mut self, cmd: &VehicleCommand, now: u64) -> CommandResult {
        let arming_action = libm::roundf(cmd.param1) as i8;

        if arming_action != ARMING_ACTION_ARM && arming_action != ARMING_ACTION_DISARM {
            self.events.push(
                "commander_unsupported_arm_disarm_param",
                Severity::Critical,
                "Unsupported ARM_DISARM parameter",
            );
            return CommandResult::Unsupported;
        }

        let forced = libm::roundf(cmd.param2) as i32 == FORCE_ARMING_MAGIC;
        let cmd_from_io = libm::roundf(cmd.param3) as i32 == IN_AIR_RESTORE_MAGIC;

        // An onboard-IO arm request while airborne restores the armed state
        // through IN_AIR_RESTORE.
        if !forced
            && cmd_from_io
            && cmd.source_system == self.status.system_id
            && cmd.source_component == self.status.component_id
            && arming_action == ARMING_ACTION_ARM
        {
            self.arm_state_machine.force_state(ArmingState::InAirRestore);
            self.status.arming_state = ArmingState::InAirRestore;
        }

        let reason = if cmd.from_external {
            ArmDisarmReason::CommandExternal
        } else {
            ArmDisarmReason::CommandInternal
        };

        // The force sentinel skips the arming checks regardless of source.
        let result = if arming_action == ARMING_ACTION_ARM {
            self.arm(reason, !forced, now)
        } else {
            self.disarm(reason, forced, now)
        };

        if result == TransitionResult::Denied {
            return CommandResult::TemporarilyRejected;
        }

        // Set home on arming, but never within the in-air-restart holdoff.
        if arming_action == ARMING_ACTION_ARM
            && result == TransitionResult::Changed
            && now > self.boot_timestamp + super::INAIR_RESTART_HOLDOFF_US
            && self.params.com_home_en
        {
            self.home
                .set_home_position(&self.global_position, self.local_position.heading, now);
            self.flags.home_position_valid = self.home.valid();
            self.publish_home(now);
        }

        CommandResult::Accepted
    }

    fn handle_set_home(&mut self, cmd: &VehicleCommand, now: u64) -> CommandResult {
        if !self.params.com_home_en {
            return CommandResult::Denied;
        }

        let use_current = cmd.param1 > 0.5;
        let set = if use_current {
            if self.global_position.valid {
                // manual flag cleared so later automatic updates may refresh
                self.home.invalidate();
                self.home
                    .set_home_position(&self.global_position, self.local_position.heading, now)
            } else {
                false
            }
        } else {
            let yaw_rad = cmd.param4.to_radians();
            if cmd.param5.is_finite() && cmd.param6.is_finite() && cmd.param7.is_finite() {
                self.home
                    .set_manually(cmd.param5, cmd.param6, cmd.param7, yaw_rad, now)
            } else {
                return CommandResult::Denied;
            }
        };

        if set {
            self.flags.home_position_valid = true;
            self.publish_home(now);
            CommandResult::Accepted
        } else {
            CommandResult::TemporarilyRejected
        }
    }

    fn handle_mission_start(&mut self, cmd: &VehicleCommand, now: u64) -> CommandResult {
        if !self.status.auto_mission_available {
            return CommandResult::Denied;
        }

        // A start index at or past the end is denied (including the
        // index == seq_total edge).
        let first_item = cmd.param1;
        if !first_item.is_finite()
            || first_item < -1.0
            || first_item as i32 >= self.mission_result.seq_total as i32
        {
            return CommandResult::Denied;
        }

        if main_state_transition(
            &self.status,
            MainState::AutoMission,
            &self.flags,
            &mut self.internal,
        ) != TransitionResult::Denied
            && self.arm(ArmDisarmReason::MissionStart, true, now) != TransitionResult::Denied
        {
            CommandResult::Accepted
        } else {
            CommandResult::Denied
        }
    }

    fn handle_calibration(&mut self, cmd: &VehicleCommand) -> CommandResult {
        if self.arm_state_machine.is_armed() {
            return CommandResult::Denied;
        }
        if !self.worker.start() {
            return CommandResult::TemporarilyRejected;
        }

        self.flags.calibration_enabled = true;

        // param5 selects the RC calibration variant, param7 the ESC
        // pass-through (MAV_CMD_PREFLIGHT_CALIBRATION parameter layout).
        if cmd.param5 == 1.0 {
            self.flags.rc_calibration_in_progress = true;
        }
        if cmd.param7 == 1.0 {
            self.armed
                .set(ActuatorArmedFlags::IN_ESC_CALIBRATION_MODE, true);
        }

        CommandResult::Accepted
    }

    /// Publish the single ACK for a handled command.
    pub(crate) fn answer_command(
        &mut self,
        cmd: &VehicleCommand,
        result: CommandResult,
        now: u64,
    ) {
        if result != CommandResult::Accepted {
            self.set_tune(TuneId::NotifyNegative, true);
        }

        self.topics.vehicle_command_ack.publish(CommandAck {
            command: cmd.command,
            result,
            target_system: cmd.source_system,
            target_component: cmd.source_component,
            timestamp: now,
        });
    }
}
