//! Geofence breach prediction.
//!
//! Polygon/circle containment math is consumed as a library through the
//! [`FenceContainment`] trait; this module owns everything else: the
//! braking-distance model that projects a test point ahead of the vehicle,
//! the distance-to-home and maximum-altitude checks, and the corrective
//! loiter point emitted when the configured action is LOITER.

use crate::geo;
use crate::home::HomePosition;
use crate::status::{GlobalPosition, LocalPosition, VehicleType};
use libm::{atan2f, sqrtf};

/// Reaction delay folded into the braking distance model.
const BRAKING_DELAY_S: f32 = 0.5;

/// Predictions run at a fixed interval.
pub const GEOFENCE_CHECK_INTERVAL_US: u64 = 200_000;

/// Configured response to a fence violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeofenceAction {
    None,
    /// Report only.
    Warn,
    /// Hold inside the fence.
    Loiter,
    ReturnToLaunch,
    Land,
    Terminate,
}

impl GeofenceAction {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => GeofenceAction::Warn,
            2 => GeofenceAction::Loiter,
            3 => GeofenceAction::ReturnToLaunch,
            4 => GeofenceAction::Terminate,
            5 => GeofenceAction::Land,
            _ => GeofenceAction::None,
        }
    }
}

/// Published check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeofenceResult {
    pub violated: bool,
    pub action: GeofenceAction,
    /// The configured response needs a valid home to engage.
    pub home_required: bool,
    pub timestamp: u64,
}

impl Default for GeofenceResult {
    fn default() -> Self {
        Self {
            violated: false,
            action: GeofenceAction::None,
            home_required: false,
            timestamp: 0,
        }
    }
}

bitflags::bitflags! {
    /// Which constraint the test point violated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ViolationFlags: u8 {
        const DIST_TO_HOME = 1 << 0;
        const MAX_ALTITUDE = 1 << 1;
        const FENCE = 1 << 2;
    }
}

/// Polygon/circle containment, provided by an external fence library.
pub trait FenceContainment {
    /// True if a fence shape is loaded.
    fn has_fence(&self) -> bool;

    /// True if the point lies inside all inclusion shapes and outside all
    /// exclusion shapes.
    fn inside(&self, lat: f64, lon: f64, alt: f32) -> bool;
}

/// A containment source with no shapes loaded; everything passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFence;

impl FenceContainment for NoFence {
    fn has_fence(&self) -> bool {
        false
    }

    fn inside(&self, _lat: f64, _lon: f64, _alt: f32) -> bool {
        true
    }
}

/// Horizontal braking distance for a multirotor at the given speed.
pub fn braking_distance(speed: f32, max_accel: f32) -> f32 {
    if max_accel <= 0.0 {
        return 0.0;
    }
    let speed = speed.max(0.0);
    speed * BRAKING_DELAY_S + (speed * speed) / (2.0 * max_accel)
}

/// Monitor tuning, a slice of the navigator parameters.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceConfig {
    pub action: GeofenceAction,
    /// Maximum horizontal distance from home, meters (0 disables).
    pub max_hor_dist: f32,
    /// Maximum altitude above home, meters (0 disables).
    pub max_ver_dist: f32,
    /// Predict breaches instead of reacting to the current position.
    pub predict: bool,
    /// Horizontal braking deceleration, m/s^2.
    pub acc_hor: f32,
    /// Vertical braking deceleration, m/s^2.
    pub acc_ver: f32,
    /// Loiter radius for the fixed-wing test distance.
    pub loiter_radius: f32,
}

/// Outcome of one periodic check.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceCheckOutcome {
    pub result: GeofenceResult,
    /// This check crossed the no-violation -> violation edge.
    pub first_breach: bool,
    /// Corrective loiter target, set on the first breach with LOITER action.
    pub loiter_point: Option<(f64, f64, f32)>,
}

/// Periodic breach predictor.
#[derive(Debug, Default)]
pub struct GeofenceMonitor {
    last_check: u64,
    violation_warning_sent: bool,
}

impl GeofenceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the check if the interval elapsed.
    ///
    /// Builds the test point from the braking distance (rotary wing) or
    /// fixed radii (fixed wing), then evaluates distance-to-home, maximum
    /// altitude and fence containment.
    #[allow(clippy::too_many_arguments)]
    pub fn check(
        &mut self,
        fence: &dyn FenceContainment,
        config: &GeofenceConfig,
        global: &GlobalPosition,
        local: &LocalPosition,
        home: &HomePosition,
        vehicle_type: VehicleType,
        nav_bearing: Option<f32>,
        now_us: u64,
    ) -> Option<GeofenceCheckOutcome> {
        if config.action == GeofenceAction::None || !global.valid {
            return None;
        }
        if now_us.saturating_sub(self.last_check) < GEOFENCE_CHECK_INTERVAL_US {
            return None;
        }
        self.last_check = now_us;

        let (test_point_distance, vertical_test_distance, test_bearing) =
            if vehicle_type == VehicleType::RotaryWing {
                let hor_speed = sqrtf(local.vx * local.vx + local.vy * local.vy);
                (
                    braking_distance(hor_speed, config.acc_hor),
                    braking_distance(-local.vz, config.acc_ver),
                    atan2f(local.vy, local.vx),
                )
            } else {
                // fixed wing: the loiter circle bounds the escape maneuver
                let bearing = nav_bearing.unwrap_or_else(|| atan2f(local.vy, local.vx));
                (2.0 * config.loiter_radius, 5.0, bearing)
            };

        let (test_lat, test_lon, vertical_test_distance) = if config.predict {
            let (lat, lon) = geo::waypoint_from_heading_and_distance(
                global.lat,
                global.lon,
                test_bearing as f64,
                test_point_distance as f64,
            );
            (lat, lon, vertical_test_distance)
        } else {
            (global.lat, global.lon, 0.0)
        };

        let mut violation = ViolationFlags::empty();

        if home.valid {
            if config.max_hor_dist > 0.0 {
                let dist = geo::distance(test_lat, test_lon, home.lat, home.lon) as f32;
                violation.set(ViolationFlags::DIST_TO_HOME, dist > config.max_hor_dist);
            }
            if config.max_ver_dist > 0.0 {
                let alt_above_home = global.alt + vertical_test_distance - home.alt;
                violation.set(ViolationFlags::MAX_ALTITUDE, alt_above_home > config.max_ver_dist);
            }
        }

        if fence.has_fence() {
            violation.set(
                ViolationFlags::FENCE,
                !fence.inside(test_lat, test_lon, global.alt),
            );
        }

        let violated = !violation.is_empty();
        let first_breach = violated && !self.violation_warning_sent;

        let loiter_point = if first_breach && config.action == GeofenceAction::Loiter {
            if vehicle_type == VehicleType::RotaryWing {
                // the braking model over-estimates; holding at the current
                // position keeps the vehicle inside the fence
                Some((global.lat, global.lon, global.alt))
            } else {
                Some((test_lat, test_lon, global.alt))
            }
        } else {
            None
        };

        if violated {
            self.violation_warning_sent = true;
        } else {
            self.violation_warning_sent = false;
        }

        Some(GeofenceCheckOutcome {
            result: GeofenceResult {
                violated,
                action: config.action,
                home_required: matches!(
                    config.action,
                    GeofenceAction::ReturnToLaunch
                ) || config.max_hor_dist > 0.0,
                timestamp: now_us,
            },
            first_breach,
            loiter_point,
        })
    }
}
