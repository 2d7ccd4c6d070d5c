//! Operator action dispatcher.
//!
//! Action requests are the decoded user intents from the RC layer: arm,
//! disarm, kill, mode switch. They bypass the command protocol and get no
//! ACK; feedback is the tune/LED/event surface.

use super::Commander;
use crate::arming::TransitionResult;
use crate::events::Severity;
use crate::mode::main_state_transition;
use crate::status::{
    ActionRequest, ActionRequestAction, ActionRequestSource, ActuatorArmedFlags, ArmDisarmReason,
    MainState,
};
use crate::traits::TimeSource;

impl<'t, T: TimeSource> Commander<'t, T> {
    pub(crate) fn execute_action_request(&mut self, request: &ActionRequest, now: u64) {
        // RC gestures are silently ignored while the sticks are being
        // calibrated.
        if self.flags.rc_calibration_in_progress {
            return;
        }

        let reason = match request.source {
            ActionRequestSource::RcStickGesture => ArmDisarmReason::RcStick,
            ActionRequestSource::RcSwitch => ArmDisarmReason::RcSwitch,
            ActionRequestSource::RcButton => ArmDisarmReason::RcButton,
            ActionRequestSource::RcModeSlot => ArmDisarmReason::RcSwitch,
        };

        match request.action {
            ActionRequestAction::Arm => {
                self.arm(reason, true, now);
            }
            ActionRequestAction::Disarm => {
                self.disarm(reason, false, now);
            }
            ActionRequestAction::ToggleArming => {
                if self.arm_state_machine.is_armed() {
                    self.disarm(reason, false, now);
                } else {
                    self.arm(reason, true, now);
                }
            }

            ActionRequestAction::Kill => {
                if reason == ArmDisarmReason::RcSwitch && !self.armed.manual_lockdown() {
                    let severity = if self.land_detected.landed {
                        Severity::Info
                    } else {
                        Severity::Critical
                    };
                    self.events
                        .push("commander_kill_sw_engaged", severity, "Kill-switch engaged");
                    self.armed.set(ActuatorArmedFlags::MANUAL_LOCKDOWN, true);
                    self.status_changed = true;
                    self.send_parachute_command(now);
                }
            }

            ActionRequestAction::Unkill => {
                if reason == ArmDisarmReason::RcSwitch && self.armed.manual_lockdown() {
                    self.events.push(
                        "commander_kill_sw_disengaged",
                        Severity::Info,
                        "Kill-switch disengaged",
                    );
                    self.armed.set(ActuatorArmedFlags::MANUAL_LOCKDOWN, false);
                    self.status_changed = true;
                }
            }

            ActionRequestAction::SwitchMode => {
                let Some(mode) = request.mode else {
                    return;
                };

                // The first RC mode-slot assignment after boot installs an
                // assisted mode without transition checks.
                if request.source == ActionRequestSource::RcModeSlot
                    && !self.arm_state_machine.is_armed()
                    && self.internal.main_state_changes == 0
                    && (mode == MainState::Altctl || mode == MainState::Posctl)
                {
                    self.internal.main_state = mode;
                    self.internal.main_state_changes += 1;
                }

                if main_state_transition(&self.status, mode, &self.flags, &mut self.internal)
                    == TransitionResult::Denied
                {
                    self.print_reject_mode(now);
                }
            }
        }
    }
}
