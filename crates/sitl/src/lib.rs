//! strato_sitl - Software-in-the-loop harness
//!
//! Hosts the supervisory core on a workstation: a lockstep clock, a
//! point-mass vehicle model, a polygon/circle fence library, and the
//! composition root wiring the commander and navigator over the topic
//! bus. The integration tests drive complete flight scenarios through
//! this crate.

pub mod fence;
pub mod model;
pub mod sim;
pub mod time;

pub use fence::SimpleFence;
pub use model::VehicleModel;
pub use sim::{SensorConfig, SimVehicle, SIM_STEP_US};
pub use time::SimClock;
