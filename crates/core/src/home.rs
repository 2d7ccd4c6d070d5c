//! Home position manager.
//!
//! Home is set on first arming past the boot holdoff, by explicit command,
//! or on the takeoff edge when in-air home is enabled. Once set, home stays
//! valid until shutdown so a return action can never lose its reference
//! mid-flight.

use crate::status::GlobalPosition;

/// The reference position used by RTL and some failsafe actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomePosition {
    pub lat: f64,
    pub lon: f64,
    /// Altitude AMSL, meters.
    pub alt: f32,
    /// Yaw at the time home was set, radians.
    pub yaw: f32,
    pub valid: bool,
    /// Set through DO_SET_HOME rather than automatically.
    pub manual_home: bool,
    pub timestamp: u64,
}

impl Default for HomePosition {
    fn default() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            yaw: f32::NAN,
            valid: false,
            manual_home: false,
            timestamp: 0,
        }
    }
}

/// Establishes and refreshes home.
#[derive(Debug, Default)]
pub struct HomePositionManager {
    home: HomePosition,
}

impl HomePositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn home(&self) -> HomePosition {
        self.home
    }

    pub fn valid(&self) -> bool {
        self.home.valid
    }

    /// Set home from the current position estimate.
    ///
    /// Fails when no valid global position is available. An automatic set
    /// never overrides a manually commanded home.
    pub fn set_home_position(
        &mut self,
        global: &GlobalPosition,
        heading: f32,
        now_us: u64,
    ) -> bool {
        if !global.valid || !global.lat.is_finite() || !global.lon.is_finite() {
            return false;
        }
        if self.home.manual_home {
            return false;
        }
        self.home = HomePosition {
            lat: global.lat,
            lon: global.lon,
            alt: global.alt,
            yaw: heading,
            valid: true,
            manual_home: false,
            timestamp: now_us,
        };
        true
    }

    /// Refresh home in flight (same source, explicit opt-in by caller).
    pub fn set_in_air_home_position(
        &mut self,
        global: &GlobalPosition,
        heading: f32,
        now_us: u64,
    ) -> bool {
        self.set_home_position(global, heading, now_us)
    }

    /// Set home to explicit coordinates.
    pub fn set_manually(&mut self, lat: f64, lon: f64, alt: f32, yaw: f32, now_us: u64) -> bool {
        if !lat.is_finite() || !lon.is_finite() || !alt.is_finite() {
            return false;
        }
        self.home = HomePosition {
            lat,
            lon,
            alt,
            yaw,
            valid: true,
            manual_home: true,
            timestamp: now_us,
        };
        true
    }

    /// Invalidate home. Only called on shutdown.
    pub fn invalidate(&mut self) {
        self.home = HomePosition::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(lat: f64, lon: f64, alt: f32) -> GlobalPosition {
        GlobalPosition {
            lat,
            lon,
            alt,
            valid: true,
            timestamp: 0,
        }
    }

    #[test]
    fn set_from_valid_position() {
        let mut manager = HomePositionManager::new();
        assert!(!manager.valid());

        assert!(manager.set_home_position(&position(47.397, 8.545, 488.0), 1.2, 1_000_000));
        assert!(manager.valid());
        let home = manager.home();
        assert_eq!(home.lat, 47.397);
        assert_eq!(home.alt, 488.0);
        assert!(!home.manual_home);
    }

    #[test]
    fn rejects_invalid_position() {
        let mut manager = HomePositionManager::new();
        let mut pos = position(f64::NAN, 8.545, 488.0);
        assert!(!manager.set_home_position(&pos, 0.0, 0));

        pos = position(47.397, 8.545, 488.0);
        pos.valid = false;
        assert!(!manager.set_home_position(&pos, 0.0, 0));
        assert!(!manager.valid());
    }

    #[test]
    fn manual_home_wins_over_automatic() {
        let mut manager = HomePositionManager::new();
        assert!(manager.set_manually(10.0, 20.0, 100.0, 0.0, 0));

        // later automatic set must not overwrite
        assert!(!manager.set_home_position(&position(47.0, 8.0, 400.0), 0.0, 1));
        assert_eq!(manager.home().lat, 10.0);
        assert!(manager.home().manual_home);
    }

    #[test]
    fn manual_rejects_non_finite() {
        let mut manager = HomePositionManager::new();
        assert!(!manager.set_manually(f64::NAN, 20.0, 100.0, 0.0, 0));
        assert!(!manager.set_manually(10.0, 20.0, f32::NAN, 0.0, 0));
        assert!(!manager.valid());
    }

    #[test]
    fn invalidate_clears() {
        let mut manager = HomePositionManager::new();
        manager.set_manually(10.0, 20.0, 100.0, 0.0, 0);
        manager.invalidate();
        assert!(!manager.valid());
        // automatic set works again
        assert!(manager.set_home_position(&position(47.0, 8.0, 400.0), 0.0, 2));
    }
}
