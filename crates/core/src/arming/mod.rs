//! Arming subsystem.
//!
//! The five-and-a-half-state arm lifecycle machine plus the health and
//! arming checks that gate it. Mode-level arming gates (throttle position,
//! geofence home requirement) live in the commander, which owns the
//! surrounding context.

mod checks;
mod state_machine;

pub use checks::{HealthAndArmingChecks, ModeRequirements};
pub use state_machine::ArmStateMachine;

/// Outcome of a state-machine transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionResult {
    /// Transition performed.
    Changed,
    /// Already in the requested state.
    NotChanged,
    /// Transition rejected; state unchanged.
    Denied,
}

impl TransitionResult {
    pub fn denied(self) -> bool {
        self == TransitionResult::Denied
    }
}
