//! Platform abstraction traits.

mod time;

pub use time::{MockTime, TimeSource};
