//! Point-mass vehicle model.
//!
//! Follows the position-setpoint triplet the navigator publishes: climbs
//! on takeoff setpoints, flies great-circle legs toward position and
//! loiter targets, descends on land setpoints. Good enough to close the
//! loop for supervisory-level scenarios; it is not a flight dynamics
//! model.

use nalgebra::Vector2;

use strato_core::geo;
use strato_core::status::{PositionSetpointTriplet, SetpointType};

/// Default horizontal speed when the setpoint carries none, m/s.
const DEFAULT_SPEED: f32 = 5.0;
/// Climb/descend rate, m/s.
const CLIMB_RATE: f32 = 1.5;
/// Landing descent rate, m/s.
const LAND_RATE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct VehicleModel {
    pub lat: f64,
    pub lon: f64,
    /// Altitude AMSL, meters.
    pub alt: f32,
    /// Terrain altitude AMSL, meters.
    pub ground_alt: f32,
    /// NED velocity, m/s.
    pub vn: f32,
    pub ve: f32,
    pub vz: f32,
    /// Heading, radians.
    pub heading: f32,
    pub landed: bool,
}

impl VehicleModel {
    pub fn new(lat: f64, lon: f64, ground_alt: f32) -> Self {
        Self {
            lat,
            lon,
            alt: ground_alt,
            ground_alt,
            vn: 0.0,
            ve: 0.0,
            vz: 0.0,
            heading: 0.0,
            landed: true,
        }
    }

    /// Advance the model by `dt` seconds.
    pub fn step(&mut self, triplet: &PositionSetpointTriplet, armed: bool, dt: f32) {
        if !armed {
            self.vn = 0.0;
            self.ve = 0.0;
            self.vz = 0.0;
            self.landed = self.alt <= self.ground_alt + 0.1;
            return;
        }

        let sp = &triplet.current;
        if !sp.valid {
            self.vn = 0.0;
            self.ve = 0.0;
            self.vz = 0.0;
            return;
        }

        match sp.setpoint_type {
            SetpointType::Takeoff => {
                self.track_altitude(sp.alt, CLIMB_RATE, dt);
                self.vn = 0.0;
                self.ve = 0.0;
            }
            SetpointType::Position | SetpointType::Loiter => {
                if sp.lat.is_finite() && sp.lon.is_finite() {
                    self.track_position(sp.lat, sp.lon, sp.cruising_speed, dt);
                }
                if sp.alt_valid && sp.alt.is_finite() {
                    self.track_altitude(sp.alt, CLIMB_RATE, dt);
                }
            }
            SetpointType::Land => {
                if sp.lat.is_finite() && sp.lon.is_finite() {
                    self.track_position(sp.lat, sp.lon, sp.cruising_speed, dt);
                }
                self.alt = (self.alt - LAND_RATE * dt).max(self.ground_alt);
                self.vz = LAND_RATE;
            }
            SetpointType::Idle => {
                self.vn = 0.0;
                self.ve = 0.0;
                self.vz = 0.0;
            }
        }

        self.landed = self.alt <= self.ground_alt + 0.1;
    }

    fn track_position(&mut self, target_lat: f64, target_lon: f64, speed: f32, dt: f32) {
        let (distance, bearing) = geo::distance_and_bearing(self.lat, self.lon, target_lat, target_lon);
        let speed = if speed > 0.0 { speed } else { DEFAULT_SPEED };
        let step = (speed * dt) as f64;

        if distance <= step {
            self.lat = target_lat;
            self.lon = target_lon;
            self.vn = 0.0;
            self.ve = 0.0;
            return;
        }

        let (lat, lon) = geo::waypoint_from_heading_and_distance(self.lat, self.lon, bearing, step);
        self.lat = lat;
        self.lon = lon;

        let velocity = Vector2::new(bearing.cos(), bearing.sin()) * speed as f64;
        self.vn = velocity.x as f32;
        self.ve = velocity.y as f32;
        self.heading = bearing as f32;
    }

    fn track_altitude(&mut self, target: f32, rate: f32, dt: f32) {
        let delta = target - self.alt;
        let step = rate * dt;
        if delta.abs() <= step {
            self.alt = target;
            self.vz = 0.0;
        } else {
            self.alt += step.copysign(delta);
            self.vz = -rate.copysign(delta);
        }
    }

    pub fn ground_speed(&self) -> f32 {
        Vector2::new(self.vn, self.ve).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_core::status::PositionSetpoint;

    fn triplet_with(sp: PositionSetpoint) -> PositionSetpointTriplet {
        PositionSetpointTriplet {
            current: sp,
            ..Default::default()
        }
    }

    #[test]
    fn disarmed_model_stays_put() {
        let mut model = VehicleModel::new(47.0, 8.0, 488.0);
        let mut sp = PositionSetpoint::reset();
        sp.valid = true;
        sp.setpoint_type = SetpointType::Takeoff;
        sp.alt = 500.0;

        model.step(&triplet_with(sp), false, 1.0);
        assert_eq!(model.alt, 488.0);
        assert!(model.landed);
    }

    #[test]
    fn takeoff_climbs_to_target() {
        let mut model = VehicleModel::new(47.0, 8.0, 488.0);
        let mut sp = PositionSetpoint::reset();
        sp.valid = true;
        sp.setpoint_type = SetpointType::Takeoff;
        sp.alt = 491.0;

        for _ in 0..30 {
            model.step(&triplet_with(sp), true, 0.1);
        }
        assert!((model.alt - 491.0).abs() < 0.2);
        assert!(!model.landed);
    }

    #[test]
    fn flies_toward_position_target() {
        let mut model = VehicleModel::new(47.0, 8.0, 500.0);
        model.landed = false;
        let mut sp = PositionSetpoint::reset();
        sp.valid = true;
        sp.setpoint_type = SetpointType::Position;
        sp.lat = 47.001; // ~111 m north
        sp.lon = 8.0;
        sp.alt = 500.0;
        sp.alt_valid = true;
        sp.cruising_speed = 5.0;

        let start_dist = geo::distance(model.lat, model.lon, sp.lat, sp.lon);
        for _ in 0..100 {
            model.step(&triplet_with(sp), true, 0.1);
        }
        let end_dist = geo::distance(model.lat, model.lon, sp.lat, sp.lon);
        // 10 s at 5 m/s: ~50 m covered
        assert!(start_dist - end_dist > 45.0);
        assert!(model.ground_speed() > 4.0);
    }

    #[test]
    fn landing_reaches_ground() {
        let mut model = VehicleModel::new(47.0, 8.0, 488.0);
        model.alt = 493.0;
        model.landed = false;
        let mut sp = PositionSetpoint::reset();
        sp.valid = true;
        sp.setpoint_type = SetpointType::Land;
        sp.lat = 47.0;
        sp.lon = 8.0;

        for _ in 0..80 {
            model.step(&triplet_with(sp), true, 0.1);
        }
        assert_eq!(model.alt, 488.0);
        assert!(model.landed);
    }
}
