//! Arm state machine.
//!
//! Lifecycle: INIT -> STANDBY -> ARMED -> STANDBY, with STANDBY_ERROR for
//! irrecoverable preflight failures, SHUTDOWN as the terminal state and
//! IN_AIR_RESTORE as the transient entry used when onboard IO re-arms a
//! vehicle that restarted mid-flight.

use super::checks::HealthAndArmingChecks;
use super::TransitionResult;
use crate::events::{EventBuffer, Severity};
use crate::status::{
    ActuatorArmed, ActuatorArmedFlags, ArmDisarmReason, ArmingState, VehicleStatus,
};

/// The arm lifecycle machine. Owns nothing but the current state; all
/// context is passed per transition attempt.
#[derive(Debug)]
pub struct ArmStateMachine {
    state: ArmingState,
}

impl Default for ArmStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmStateMachine {
    pub const fn new() -> Self {
        Self {
            state: ArmingState::Init,
        }
    }

    pub fn state(&self) -> ArmingState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == ArmingState::Armed
    }

    pub fn is_standby(&self) -> bool {
        self.state == ArmingState::Standby
    }

    pub fn is_init(&self) -> bool {
        self.state == ArmingState::Init
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == ArmingState::Shutdown
    }

    /// Force the machine into a state without transition checks.
    ///
    /// Only used for the IN_AIR_RESTORE entry requested by onboard IO.
    pub fn force_state(&mut self, state: ArmingState) {
        self.state = state;
    }

    /// Attempt a transition.
    ///
    /// On success the vehicle status and actuator-armed records are updated
    /// to match. Denials emit a structured event (the caller adds the
    /// audible cue).
    #[allow(clippy::too_many_arguments)]
    pub fn arming_state_transition(
        &mut self,
        status: &mut VehicleStatus,
        armed: &mut ActuatorArmed,
        checks: &HealthAndArmingChecks,
        new_state: ArmingState,
        run_preflight_checks: bool,
        reason: ArmDisarmReason,
        now_us: u64,
        events: &mut EventBuffer,
    ) -> TransitionResult {
        if new_state == self.state {
            return TransitionResult::NotChanged;
        }

        let valid = match (self.state, new_state) {
            // Boot path. A denied attempt stays in INIT; the commander
            // retries every tick.
            (ArmingState::Init, ArmingState::Standby) => {
                if !checks.can_arm(status.nav_state) {
                    return TransitionResult::Denied;
                }
                true
            }
            (ArmingState::Init, ArmingState::StandbyError) => true,
            (ArmingState::Standby, ArmingState::Init) => true,
            (ArmingState::StandbyError, ArmingState::Standby) => checks.can_arm(status.nav_state),

            // Arming.
            (ArmingState::Standby, ArmingState::Armed)
            | (ArmingState::InAirRestore, ArmingState::Armed) => {
                if armed.force_failsafe() || armed.lockdown() {
                    self.deny(events, reason, "flight termination active");
                    return TransitionResult::Denied;
                }
                if run_preflight_checks && !checks.can_arm(status.nav_state) {
                    self.deny(
                        events,
                        reason,
                        checks.failure_reason().unwrap_or("preflight checks failed"),
                    );
                    return TransitionResult::Denied;
                }
                true
            }

            // Disarming is always permitted; the commander gates on landing.
            (ArmingState::Armed, ArmingState::Standby) => true,

            // Shutdown only from a disarmed state.
            (ArmingState::Init, ArmingState::Shutdown)
            | (ArmingState::Standby, ArmingState::Shutdown)
            | (ArmingState::StandbyError, ArmingState::Shutdown) => true,

            // In-air restore entry is driven by force_state.
            _ => false,
        };

        if !valid {
            self.deny(events, reason, "invalid arming transition");
            return TransitionResult::Denied;
        }

        self.state = new_state;
        status.arming_state = new_state;

        match new_state {
            ArmingState::Armed => {
                armed.set(ActuatorArmedFlags::ARMED, true);
                status.armed_time = now_us;
            }
            ArmingState::Shutdown => {
                armed.set(ActuatorArmedFlags::ARMED, false);
                armed.set(ActuatorArmedFlags::PREARMED, false);
            }
            _ => {
                armed.set(ActuatorArmedFlags::ARMED, false);
                status.armed_time = 0;
            }
        }

        TransitionResult::Changed
    }

    fn deny(&self, events: &mut EventBuffer, reason: ArmDisarmReason, _detail: &'static str) {
        // Boot-time retries would flood the log.
        if reason != ArmDisarmReason::TransitionToStandby {
            events.push(
                "commander_arming_denied",
                Severity::Critical,
                "Arming denied",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{BatteryWarning, NavState, StatusFlags};

    struct Fixture {
        machine: ArmStateMachine,
        status: VehicleStatus,
        armed: ActuatorArmed,
        checks: HealthAndArmingChecks,
        events: EventBuffer,
    }

    impl Fixture {
        fn new() -> Self {
            let mut fixture = Self {
                machine: ArmStateMachine::new(),
                status: VehicleStatus::default(),
                armed: ActuatorArmed::default(),
                checks: HealthAndArmingChecks::new(),
                events: EventBuffer::new(),
            };
            fixture.status.nav_state = NavState::Manual;
            fixture.pass_checks();
            fixture
        }

        fn pass_checks(&mut self) {
            self.checks.update(&self.status, &StatusFlags::default());
        }

        fn fail_checks(&mut self) {
            let mut flags = StatusFlags::default();
            flags.battery_warning = BatteryWarning::Critical;
            self.checks.update(&self.status, &flags);
        }

        fn transition(&mut self, to: ArmingState, run_checks: bool) -> TransitionResult {
            self.machine.arming_state_transition(
                &mut self.status,
                &mut self.armed,
                &self.checks,
                to,
                run_checks,
                ArmDisarmReason::CommandInternal,
                1_000_000,
                &mut self.events,
            )
        }
    }

    #[test]
    fn boot_to_standby_to_armed() {
        let mut f = Fixture::new();
        assert_eq!(f.transition(ArmingState::Standby, true), TransitionResult::Changed);
        assert_eq!(f.transition(ArmingState::Armed, true), TransitionResult::Changed);
        assert!(f.machine.is_armed());
        assert!(f.armed.armed());
        assert_eq!(f.status.armed_time, 1_000_000);
    }

    #[test]
    fn same_state_is_not_changed() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        assert_eq!(
            f.transition(ArmingState::Standby, true),
            TransitionResult::NotChanged
        );
    }

    #[test]
    fn init_stays_when_checks_fail() {
        let mut f = Fixture::new();
        f.fail_checks();
        assert_eq!(f.transition(ArmingState::Standby, true), TransitionResult::Denied);
        assert!(f.machine.is_init());
        // boot-time retries are silent
        assert!(f.events.is_empty());
    }

    #[test]
    fn arming_denied_when_checks_fail() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        f.fail_checks();
        assert_eq!(f.transition(ArmingState::Armed, true), TransitionResult::Denied);
        assert!(!f.machine.is_armed());
        assert!(f.events.contains("commander_arming_denied"));
    }

    #[test]
    fn forced_arming_skips_checks() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        f.fail_checks();
        assert_eq!(f.transition(ArmingState::Armed, false), TransitionResult::Changed);
        assert!(f.machine.is_armed());
    }

    #[test]
    fn force_failsafe_blocks_rearming_until_cleared() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        f.transition(ArmingState::Armed, true);

        // termination fires mid-flight, then the vehicle disarms
        f.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, true);
        f.transition(ArmingState::Standby, false);

        // arming is refused even with passing checks or forced
        assert_eq!(f.transition(ArmingState::Armed, true), TransitionResult::Denied);
        assert_eq!(f.transition(ArmingState::Armed, false), TransitionResult::Denied);

        // external command clears force_failsafe: arming works again
        f.armed.set(ActuatorArmedFlags::FORCE_FAILSAFE, false);
        assert_eq!(f.transition(ArmingState::Armed, true), TransitionResult::Changed);
    }

    #[test]
    fn shutdown_requires_disarmed() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        f.transition(ArmingState::Armed, true);
        assert_eq!(f.transition(ArmingState::Shutdown, false), TransitionResult::Denied);

        f.transition(ArmingState::Standby, false);
        assert_eq!(f.transition(ArmingState::Shutdown, false), TransitionResult::Changed);
        assert!(f.machine.is_shutdown());
    }

    #[test]
    fn standby_error_recovers_only_with_passing_checks() {
        let mut f = Fixture::new();
        assert_eq!(
            f.transition(ArmingState::StandbyError, false),
            TransitionResult::Changed
        );

        // arming from the error state is not a valid transition
        assert_eq!(f.transition(ArmingState::Armed, false), TransitionResult::Denied);

        f.fail_checks();
        assert_eq!(f.transition(ArmingState::Standby, true), TransitionResult::Denied);

        f.pass_checks();
        assert_eq!(f.transition(ArmingState::Standby, true), TransitionResult::Changed);
    }

    #[test]
    fn in_air_restore_to_armed() {
        let mut f = Fixture::new();
        f.machine.force_state(ArmingState::InAirRestore);
        assert_eq!(f.transition(ArmingState::Armed, false), TransitionResult::Changed);
        assert!(f.machine.is_armed());
    }

    #[test]
    fn disarm_clears_armed_time() {
        let mut f = Fixture::new();
        f.transition(ArmingState::Standby, true);
        f.transition(ArmingState::Armed, true);
        assert!(f.status.armed_time > 0);

        f.transition(ArmingState::Standby, false);
        assert_eq!(f.status.armed_time, 0);
        assert!(!f.armed.armed());
    }
}
