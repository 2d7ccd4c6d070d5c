//! Input topic records from the external collaborators.
//!
//! Estimators, the land detector, the telemetry transport and the power
//! system publish these; the supervisory tasks only read them.

use heapless::String;

/// Land detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LandDetected {
    pub landed: bool,
    pub maybe_landed: bool,
    pub ground_contact: bool,
    pub timestamp: u64,
}

/// Operator stick positions, normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualControlSetpoint {
    pub valid: bool,
    /// Pitch stick, [-1, 1].
    pub x: f32,
    /// Roll stick, [-1, 1].
    pub y: f32,
    /// Throttle stick, [0, 1].
    pub z: f32,
    /// Yaw stick, [-1, 1].
    pub r: f32,
    pub sticks_moving: bool,
    pub source: ManualControlSource,
    pub timestamp: u64,
}

impl Default for ManualControlSetpoint {
    fn default() -> Self {
        Self {
            valid: false,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            r: 0.0,
            sticks_moving: false,
            source: ManualControlSource::Rc,
            timestamp: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManualControlSource {
    Rc,
    Mavlink,
}

/// Radio link class of a telemetry status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkType {
    Generic,
    Usb,
    Iridium,
}

/// Per-link heartbeat report from the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryStatus {
    pub link_type: LinkType,
    pub heartbeat_gcs: bool,
    pub heartbeat_onboard_controller: bool,
    pub heartbeat_parachute: bool,
    pub heartbeat_open_drone_id: bool,
    pub heartbeat_avoidance: bool,
    pub parachute_system_healthy: bool,
    pub open_drone_id_system_healthy: bool,
    pub avoidance_system_healthy: bool,
    pub timestamp: u64,
}

impl Default for TelemetryStatus {
    fn default() -> Self {
        Self {
            link_type: LinkType::Generic,
            heartbeat_gcs: false,
            heartbeat_onboard_controller: false,
            heartbeat_parachute: false,
            heartbeat_open_drone_id: false,
            heartbeat_avoidance: false,
            parachute_system_healthy: false,
            open_drone_id_system_healthy: false,
            avoidance_system_healthy: false,
            timestamp: 0,
        }
    }
}

/// High-latency (Iridium) modem status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IridiumStatus {
    pub last_heartbeat: u64,
    pub timestamp: u64,
}

/// Offboard controller capability report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OffboardControlMode {
    pub position: bool,
    pub velocity: bool,
    pub acceleration: bool,
    pub attitude: bool,
    pub body_rate: bool,
    pub actuator: bool,
    pub timestamp: u64,
}

impl OffboardControlMode {
    pub fn any_active(&self) -> bool {
        self.position
            || self.velocity
            || self.acceleration
            || self.attitude
            || self.body_rate
            || self.actuator
    }
}

/// VTOL transition status from the attitude controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VtolState {
    Mc,
    Fw,
    TransitionToMc,
    TransitionToFw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtolVehicleStatus {
    pub vtol_state: VtolState,
    pub transition_failsafe: bool,
    pub timestamp: u64,
}

impl Default for VtolVehicleStatus {
    fn default() -> Self {
        Self {
            vtol_state: VtolState::Mc,
            transition_failsafe: false,
            timestamp: 0,
        }
    }
}

/// Wind estimate (NE components, m/s).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wind {
    pub windspeed_north: f32,
    pub windspeed_east: f32,
    pub timestamp: u64,
}

impl Wind {
    pub fn speed(&self) -> f32 {
        libm::sqrtf(
            self.windspeed_north * self.windspeed_north
                + self.windspeed_east * self.windspeed_east,
        )
    }
}

/// Battery estimate relevant to the supervisory core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub connected: bool,
    pub warning: crate::status::BatteryWarning,
    /// Remaining flight time no longer covers a return flight.
    pub low_remaining_time: bool,
    pub timestamp: u64,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            connected: false,
            warning: crate::status::BatteryWarning::None,
            low_remaining_time: false,
            timestamp: 0,
        }
    }
}

/// GNSS fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsFix {
    NoFix,
    Fix2D,
    Fix3D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub fix: GpsFix,
    pub timestamp: u64,
}

impl Default for GpsPosition {
    fn default() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            fix: GpsFix::NoFix,
            timestamp: 0,
        }
    }
}

/// Fused global position estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPosition {
    pub lat: f64,
    pub lon: f64,
    /// Altitude AMSL, meters.
    pub alt: f32,
    pub valid: bool,
    pub timestamp: u64,
}

impl Default for GlobalPosition {
    fn default() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            valid: false,
            timestamp: 0,
        }
    }
}

/// Fused local position/velocity estimate (NED, meters).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// Heading, radians.
    pub heading: f32,
    pub xy_valid: bool,
    pub z_valid: bool,
    pub v_xy_valid: bool,
    pub v_z_valid: bool,
    pub timestamp: u64,
}

/// Board power report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemPower {
    pub brick_valid: bool,
    pub usb_connected: bool,
    pub servo_valid: bool,
    pub timestamp: u64,
}

/// Power-button events delivered through the interrupt-safe queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerButtonEvent {
    ShutdownRequest,
}

/// Safety button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Safety {
    pub button_available: bool,
    pub off: bool,
    pub timestamp: u64,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            button_available: false,
            off: true,
            timestamp: 0,
        }
    }
}

/// CPU load report, used for the overload LED pattern.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuLoad {
    pub load: f32,
    pub timestamp: u64,
}

/// Position controller feedback used by the geofence predictor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionControllerStatus {
    /// Bearing to the active navigation target, radians.
    pub nav_bearing: f32,
    pub timestamp: u64,
}

/// Landing-phase feedback from the position controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionControllerLandingStatus {
    pub abort_landing: bool,
    pub timestamp: u64,
}

/// Region-of-interest output for the gimbal/camera subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleRoi {
    pub mode: RoiMode,
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub pitch_offset: f32,
    pub roll_offset: f32,
    pub yaw_offset: f32,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoiMode {
    None,
    NextWaypoint,
    Location,
}

impl Default for VehicleRoi {
    fn default() -> Self {
        Self {
            mode: RoiMode::None,
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            pitch_offset: 0.0,
            roll_offset: 0.0,
            yaw_offset: 0.0,
            timestamp: 0,
        }
    }
}

/// ADS-B traffic report.
#[derive(Debug, Clone, PartialEq)]
pub struct TransponderReport {
    pub icao_address: u32,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f32,
    /// Course over ground, degrees.
    pub heading: f32,
    pub hor_velocity: f32,
    pub ver_velocity: f32,
    pub callsign: String<9>,
    pub timestamp: u64,
}

impl Default for TransponderReport {
    fn default() -> Self {
        Self {
            icao_address: 0,
            lat: f64::NAN,
            lon: f64::NAN,
            altitude: f32::NAN,
            heading: 0.0,
            hor_velocity: 0.0,
            ver_velocity: 0.0,
            callsign: String::new(),
            timestamp: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_speed_magnitude() {
        let wind = Wind {
            windspeed_north: 3.0,
            windspeed_east: 4.0,
            timestamp: 0,
        };
        assert!((wind.speed() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn offboard_any_active() {
        let mut ocm = OffboardControlMode::default();
        assert!(!ocm.any_active());
        ocm.velocity = true;
        assert!(ocm.any_active());
    }

    #[test]
    fn gps_fix_ordering() {
        assert!(GpsFix::Fix3D > GpsFix::Fix2D);
        assert!(GpsFix::Fix2D > GpsFix::NoFix);
    }
}
