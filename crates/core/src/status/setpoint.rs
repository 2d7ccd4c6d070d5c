//! Position setpoint triplet.
//!
//! The navigator owns and mutates the triplet; the external position
//! controller only reads it. Coordinates are doubles for geodetic
//! precision.

/// What the controller should do at a setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetpointType {
    Idle,
    Position,
    Loiter,
    Takeoff,
    Land,
}

/// One corner of the triplet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSetpoint {
    pub valid: bool,
    pub setpoint_type: SetpointType,
    pub lat: f64,
    pub lon: f64,
    /// Altitude AMSL, meters.
    pub alt: f32,
    pub alt_valid: bool,
    /// Yaw, radians.
    pub yaw: f32,
    pub yaw_valid: bool,
    pub loiter_radius: f32,
    pub loiter_direction_counter_clockwise: bool,
    /// Negative means "use default".
    pub cruising_speed: f32,
    pub cruising_throttle: f32,
    pub acceptance_radius: f32,
    pub timestamp: u64,
}

impl Default for PositionSetpoint {
    fn default() -> Self {
        Self::reset()
    }
}

impl PositionSetpoint {
    /// An invalid, fully reset setpoint.
    pub const fn reset() -> Self {
        Self {
            valid: false,
            setpoint_type: SetpointType::Idle,
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            alt_valid: false,
            yaw: f32::NAN,
            yaw_valid: false,
            loiter_radius: f32::NAN,
            loiter_direction_counter_clockwise: false,
            cruising_speed: -1.0,
            cruising_throttle: -1.0,
            acceptance_radius: f32::NAN,
            timestamp: 0,
        }
    }
}

/// The ordered trio consumed by the position controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSetpointTriplet {
    pub previous: PositionSetpoint,
    pub current: PositionSetpoint,
    pub next: PositionSetpoint,
    pub timestamp: u64,
}

impl PositionSetpointTriplet {
    /// Reset all three setpoints to invalid.
    pub fn reset(&mut self) {
        self.previous = PositionSetpoint::reset();
        self.current = PositionSetpoint::reset();
        self.next = PositionSetpoint::reset();
    }

    /// True when the current setpoint is an established, valid loiter.
    pub fn holds_valid_loiter(&self) -> bool {
        self.current.valid && self.current.setpoint_type == SetpointType::Loiter
    }
}
