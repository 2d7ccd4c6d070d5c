//! Configuration parameters.
//!
//! A bounded in-memory [`ParameterStore`] holds the tunable values under
//! their short upper-case names. Typed blocks ([`CommanderParams`],
//! [`NavigatorParams`]) register defaults and load snapshots; the tasks
//! re-read their snapshot only while disarmed so a parameter change can
//! never flip behavior mid-flight.
//!
//! The persistent backend is external; the store only tracks a dirty flag
//! and a notification counter for it.

mod blocks;
mod error;
mod storage;

pub use blocks::{CommanderParams, NavigatorParams};
pub use error::ParameterError;
pub use storage::{ParamFlags, ParamValue, ParameterStore};

/// Marker record published when any parameter changed with notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterUpdate {
    pub timestamp: u64,
}
