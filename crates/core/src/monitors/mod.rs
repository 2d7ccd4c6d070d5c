//! Debounced watchdogs feeding the failsafe machinery.
//!
//! Each monitor is a plain struct updated from the commander tick. They
//! mutate nothing but their own state; decisions are returned to the
//! commander, which owns the transitions.

mod auto_disarm;
mod battery;
mod link;
mod wind;

pub use auto_disarm::{AutoDisarm, AutoDisarmEvent};
pub use battery::{battery_failsafe_action, BatteryMonitor, BatteryUpdate};
pub use link::{LinkMonitor, LinkTimeouts};
pub use wind::{WindAction, WindMonitor};
