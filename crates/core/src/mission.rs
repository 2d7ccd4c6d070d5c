//! Mission items and result reporting.
//!
//! The core does not persist mission plans; an uploaded plan arrives as a
//! complete record on the `mission_plan` topic and the navigator executes
//! it. Item command ids follow the MAVLink mission command set.

use heapless::Vec;

/// Maximum items in an uploaded plan.
pub const MAX_MISSION_ITEMS: usize = 64;

/// Mission item command ids (MAVLink mission command set).
pub mod item_commands {
    pub const NAV_WAYPOINT: u16 = 16;
    pub const NAV_LOITER_UNLIM: u16 = 17;
    pub const NAV_LOITER_TIME: u16 = 19;
    pub const NAV_RETURN_TO_LAUNCH: u16 = 20;
    pub const NAV_LAND: u16 = 21;
    pub const NAV_TAKEOFF: u16 = 22;
    pub const NAV_VTOL_TAKEOFF: u16 = 84;
    pub const NAV_VTOL_LAND: u16 = 85;
    /// Last id of the NAV command range.
    pub const NAV_LAST: u16 = 95;
    pub const DO_CHANGE_SPEED: u16 = 178;
    pub const DO_LAND_START: u16 = 189;
}

/// True for commands that carry a navigation target.
pub fn is_nav_command(command: u16) -> bool {
    command <= item_commands::NAV_LAST
}

/// One mission item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionItem {
    pub seq: u16,
    pub command: u16,
    pub lat: f64,
    pub lon: f64,
    /// Altitude, meters; relative to home when `alt_is_relative`.
    pub alt: f32,
    pub alt_is_relative: bool,
    /// Command-specific (hold time for waypoints, seconds).
    pub param1: f32,
    /// Command-specific (acceptance radius for waypoints, meters).
    pub param2: f32,
    pub param3: f32,
    /// Command-specific (yaw for waypoints, degrees).
    pub param4: f32,
    pub autocontinue: bool,
}

impl MissionItem {
    /// A plain waypoint with the default acceptance radius.
    pub fn waypoint(seq: u16, lat: f64, lon: f64, alt: f32) -> Self {
        Self {
            seq,
            command: item_commands::NAV_WAYPOINT,
            lat,
            lon,
            alt,
            alt_is_relative: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            autocontinue: true,
        }
    }

    pub fn is_nav(&self) -> bool {
        is_nav_command(self.command)
    }

    pub fn is_land(&self) -> bool {
        matches!(
            self.command,
            item_commands::NAV_LAND | item_commands::NAV_VTOL_LAND
        )
    }
}

/// A complete uploaded plan.
#[derive(Debug, Clone, Default)]
pub struct MissionPlan {
    pub items: Vec<MissionItem, MAX_MISSION_ITEMS>,
    pub timestamp: u64,
}

impl MissionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u16 {
        self.items.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, seq: u16) -> Option<&MissionItem> {
        self.items.get(seq as usize)
    }

    /// Index of the DO_LAND_START marker, if the plan has one.
    pub fn land_start_index(&self) -> Option<u16> {
        self.items
            .iter()
            .position(|item| item.command == item_commands::DO_LAND_START)
            .map(|index| index as u16)
    }

    /// True when the plan ends in a landing sequence.
    pub fn has_landing(&self) -> bool {
        self.items.iter().any(|item| item.is_land())
    }
}

/// Published mission progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionResult {
    pub valid: bool,
    pub failure: bool,
    /// The plan demands flight termination (validation found it unsafe).
    pub flight_termination: bool,
    pub finished: bool,
    pub warning: bool,
    /// Bumped whenever a new plan is accepted.
    pub instance_count: u32,
    pub seq_total: u16,
    pub seq_current: u16,
    pub land_start_available: bool,
    pub land_start_index: u16,
    pub timestamp: u64,
}

impl Default for MissionResult {
    fn default() -> Self {
        Self {
            valid: false,
            failure: false,
            flight_termination: false,
            finished: false,
            warning: false,
            instance_count: 0,
            seq_total: 0,
            seq_current: 0,
            land_start_available: false,
            land_start_index: 0,
            timestamp: 0,
        }
    }
}
