//! Per-mode tick logic.
//!
//! Each navigation mode is one variant of the dispatcher's tagged state;
//! its tick builds or advances the setpoint triplet. Modes never talk to
//! the bus directly; they mutate the navigator-owned triplet and mission
//! result and set the update flags.

use super::{ActiveMode, Navigator};
use crate::events::Severity;
use crate::geo;
use crate::mission::{item_commands, MissionItem, MissionPlan};
use crate::status::{SetpointType, VehicleType};
use crate::traits::TimeSource;

/// How the mission executor walks the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissionExecutionMode {
    #[default]
    Normal,
    /// Jump over everything before the landing sequence.
    FastForward,
    /// Walk the plan backwards (reversed RTL).
    Reverse,
}

/// Mission executor state.
#[derive(Debug, Default)]
pub struct MissionExecState {
    pub current_index: u16,
    pub finished: bool,
    pub execution: MissionExecutionMode,
    holding_since: Option<u64>,
}

impl MissionExecState {
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.finished = false;
        self.execution = MissionExecutionMode::Normal;
        self.holding_since = None;
    }

    /// Jump to an item. Fails when the index is out of range.
    pub fn set_current(&mut self, index: u16, plan: &MissionPlan) -> bool {
        if index >= plan.count() {
            return false;
        }
        self.current_index = index;
        self.finished = false;
        self.holding_since = None;
        true
    }
}

/// Takeoff mode state, shared with the VTOL variant.
#[derive(Debug, Default)]
pub struct TakeoffState {
    pub reached: bool,
    /// VTOL transition altitude (absolute), from NAV_VTOL_TAKEOFF.
    pub transition_alt: f32,
    pub loiter_lat: f64,
    pub loiter_lon: f64,
}

/// Loiter mode state.
#[derive(Debug, Default)]
pub struct LoiterState {
    pub established: bool,
}

impl<'t, T: TimeSource> Navigator<'t, T> {
    /// Per-mode entry work, run once per activation.
    pub(super) fn on_mode_entry(&mut self, mode: ActiveMode, now: u64) {
        match mode {
            ActiveMode::Takeoff => {
                self.takeoff.reached = false;
                self.mission_result.finished = false;
                self.mission_result_updated = true;
                self.build_takeoff_triplet(now);
            }
            ActiveMode::VtolTakeoff => {
                self.takeoff.reached = false;
                self.mission_result.finished = false;
                self.mission_result_updated = true;
            }
            ActiveMode::Land | ActiveMode::Precland => {
                self.build_land_triplet(now);
            }
            ActiveMode::Loiter => {
                self.loiter.established = false;
            }
            ActiveMode::Rtl => {
                self.rtl_entry(now);
            }
            ActiveMode::Mission | ActiveMode::None => {}
        }
    }

    // ---- mission -------------------------------------------------------

    pub(super) fn mission_tick(&mut self, now: u64) {
        if !self.mission_result.valid || self.plan.is_empty() {
            return;
        }

        if self.mission.finished {
            self.loiter_at_current_target(now);
            return;
        }

        // Settle on a NAV item, applying DO items along the way.
        if !self.advance_to_nav_item(now) {
            self.finish_mission(now);
            return;
        }

        let Some(item) = self.plan.get(self.mission.current_index).copied() else {
            self.finish_mission(now);
            return;
        };

        self.build_mission_triplet(&item, now);

        // Arrival and hold handling.
        let target_alt = self.item_altitude(&item);
        let dist = geo::distance(self.global.lat, self.global.lon, item.lat, item.lon) as f32;
        let acceptance = if item.param2 > 0.0 {
            item.param2
        } else {
            self.acceptance_radius()
        };
        let alt_ok = libm::fabsf(self.global.alt - target_alt) < self.altitude_acceptance();

        if item.is_land() {
            if self.land_detected.landed {
                self.finish_mission(now);
            }
            return;
        }

        if dist < acceptance && alt_ok {
            let hold_us = (item.param1.max(0.0) * 1e6) as u64;
            match self.mission.holding_since {
                None => {
                    self.mission.holding_since = Some(now);
                    self.events.push(
                        "navigator_mission_item_reached",
                        Severity::Info,
                        "Mission item reached",
                    );
                }
                Some(since) if now.saturating_sub(since) >= hold_us => {
                    self.mission.holding_since = None;
                    if !self.step_mission_index() {
                        self.finish_mission(now);
                    } else {
                        self.mission_result.seq_current = self.mission.current_index;
                        self.mission_result_updated = true;
                    }
                }
                Some(_) => {}
            }
        } else {
            self.mission.holding_since = None;
        }
    }

    /// Move the index onto a NAV item, consuming DO items. Returns false
    /// when the plan is exhausted.
    fn advance_to_nav_item(&mut self, _now: u64) -> bool {
        loop {
            let Some(item) = self.plan.get(self.mission.current_index).copied() else {
                return false;
            };
            if item.is_nav() {
                return true;
            }

            match item.command {
                item_commands::DO_CHANGE_SPEED => {
                    if item.param2 > 0.0 {
                        self.cruising_speed_override = Some(item.param2);
                    }
                }
                item_commands::DO_LAND_START => {}
                _ => {}
            }

            if !self.step_mission_index() {
                return false;
            }
        }
    }

    fn step_mission_index(&mut self) -> bool {
        match self.mission.execution {
            MissionExecutionMode::Normal | MissionExecutionMode::FastForward => {
                let next = self.mission.current_index + 1;
                if next >= self.plan.count() {
                    return false;
                }
                self.mission.current_index = next;
                true
            }
            MissionExecutionMode::Reverse => {
                if self.mission.current_index == 0 {
                    return false;
                }
                self.mission.current_index -= 1;
                true
            }
        }
    }

    fn build_mission_triplet(&mut self, item: &MissionItem, now: u64) {
        let target_alt = self.item_altitude(item);
        let cruising_speed = self.cruising_speed();
        let cruising_throttle = self.cruising_throttle();

        let previous = self.previous_nav_item();
        if let Some(prev) = previous {
            let prev_alt = self.item_altitude(&prev);
            self.triplet.previous.lat = prev.lat;
            self.triplet.previous.lon = prev.lon;
            self.triplet.previous.alt = prev_alt;
            self.triplet.previous.setpoint_type = SetpointType::Position;
            self.triplet.previous.valid = true;
        } else {
            self.triplet.previous.lat = self.global.lat;
            self.triplet.previous.lon = self.global.lon;
            self.triplet.previous.alt = self.global.alt;
            self.triplet.previous.setpoint_type = SetpointType::Position;
            self.triplet.previous.valid = self.global.valid;
        }

        let current = &mut self.triplet.current;
        current.lat = item.lat;
        current.lon = item.lon;
        current.alt = target_alt;
        current.alt_valid = true;
        current.setpoint_type = match item.command {
            item_commands::NAV_TAKEOFF | item_commands::NAV_VTOL_TAKEOFF => SetpointType::Takeoff,
            item_commands::NAV_LAND | item_commands::NAV_VTOL_LAND => SetpointType::Land,
            item_commands::NAV_LOITER_UNLIM | item_commands::NAV_LOITER_TIME => {
                SetpointType::Loiter
            }
            _ => SetpointType::Position,
        };
        current.yaw = if item.param4.is_finite() {
            item.param4.to_radians()
        } else {
            f32::NAN
        };
        current.yaw_valid = item.param4.is_finite();
        current.loiter_radius = self.params.nav_loiter_rad;
        current.acceptance_radius = if item.param2 > 0.0 {
            item.param2
        } else {
            self.params.nav_acc_rad
        };
        current.cruising_speed = cruising_speed;
        current.cruising_throttle = cruising_throttle;
        current.valid = true;
        current.timestamp = now;

        if let Some(next) = self.next_nav_item() {
            let next_alt = self.item_altitude(&next);
            self.triplet.next.lat = next.lat;
            self.triplet.next.lon = next.lon;
            self.triplet.next.alt = next_alt;
            self.triplet.next.setpoint_type = SetpointType::Position;
            self.triplet.next.valid = true;
        } else {
            self.triplet.next.valid = false;
        }

        self.triplet_updated = true;
    }

    fn previous_nav_item(&self) -> Option<MissionItem> {
        let index = self.mission.current_index;
        match self.mission.execution {
            MissionExecutionMode::Reverse => self
                .plan
                .items
                .iter()
                .skip(index as usize + 1)
                .find(|item| item.is_nav())
                .copied(),
            _ => self.plan.items[..index as usize]
                .iter()
                .rev()
                .find(|item| item.is_nav())
                .copied(),
        }
    }

    fn next_nav_item(&self) -> Option<MissionItem> {
        let index = self.mission.current_index;
        match self.mission.execution {
            MissionExecutionMode::Reverse => self.plan.items[..index as usize]
                .iter()
                .rev()
                .find(|item| item.is_nav())
                .copied(),
            _ => self
                .plan
                .items
                .iter()
                .skip(index as usize + 1)
                .find(|item| item.is_nav())
                .copied(),
        }
    }

    fn item_altitude(&self, item: &MissionItem) -> f32 {
        if item.alt_is_relative && self.home.valid {
            self.home.alt + item.alt
        } else {
            item.alt
        }
    }

    pub(super) fn altitude_acceptance(&self) -> f32 {
        if self.vstatus.vehicle_type == VehicleType::RotaryWing {
            1.0
        } else {
            10.0
        }
    }

    fn finish_mission(&mut self, now: u64) {
        if !self.mission.finished {
            self.mission.finished = true;
            self.mission_result.finished = true;
            self.mission_result_updated = true;
            self.events.push(
                "navigator_mission_finished",
                Severity::Info,
                "Mission finished, loitering",
            );
        }
        self.loiter_at_current_target(now);
    }

    /// Hold at the active target (or the vehicle position) without
    /// discarding its altitude.
    fn loiter_at_current_target(&mut self, now: u64) {
        let loiter_radius = self.loiter_radius();
        let current = &mut self.triplet.current;
        if !current.valid || !current.lat.is_finite() {
            current.lat = self.global.lat;
            current.lon = self.global.lon;
            current.alt = self.global.alt;
        }
        if current.setpoint_type != SetpointType::Loiter {
            current.setpoint_type = SetpointType::Loiter;
            current.loiter_radius = loiter_radius;
            current.alt_valid = true;
            current.valid = true;
            current.timestamp = now;
            self.triplet.next.valid = false;
            self.triplet_updated = true;
        }
        self.can_loiter_at_sp = true;
    }

    // ---- loiter --------------------------------------------------------

    pub(super) fn loiter_tick(&mut self, now: u64) {
        // A pending reposition wins over everything.
        if self.reposition_triplet.current.valid {
            self.triplet = self.reposition_triplet;
            self.triplet_updated = true;
            self.reposition_triplet.current.valid = false;
            self.loiter.established = true;
            self.can_loiter_at_sp = true;
            return;
        }

        if self.loiter.established && self.triplet.holds_valid_loiter() {
            return;
        }

        if self.triplet.current.valid && self.triplet.current.lat.is_finite() {
            // Preserved triplet (e.g. from takeoff): convert in place so the
            // altitude is kept.
            let current = &mut self.triplet.current;
            current.setpoint_type = SetpointType::Loiter;
            current.loiter_radius = self.params.nav_loiter_rad;
            current.timestamp = now;
        } else {
            let current = &mut self.triplet.current;
            current.lat = self.global.lat;
            current.lon = self.global.lon;
            current.alt = self.global.alt;
            current.alt_valid = true;
            current.setpoint_type = SetpointType::Loiter;
            current.loiter_radius = self.params.nav_loiter_rad;
            current.yaw = self.local.heading;
            current.yaw_valid = true;
            current.valid = true;
            current.timestamp = now;
            self.triplet.previous.valid = false;
            self.triplet.next.valid = false;
        }

        self.triplet.current.cruising_speed = self.cruising_speed();
        self.triplet.current.cruising_throttle = self.cruising_throttle();
        self.triplet.current.acceptance_radius = self.acceptance_radius();
        self.loiter.established = true;
        self.can_loiter_at_sp = true;
        self.triplet_updated = true;
    }

    // ---- takeoff -------------------------------------------------------

    fn build_takeoff_triplet(&mut self, now: u64) {
        if self.takeoff_triplet.current.valid {
            self.triplet = self.takeoff_triplet;
            self.takeoff_triplet.current.valid = false;
        } else {
            let target_alt = if self.home.valid {
                self.home.alt + self.params.mis_takeoff_alt
            } else {
                self.global.alt + self.params.mis_takeoff_alt
            };
            self.triplet.previous.lat = self.global.lat;
            self.triplet.previous.lon = self.global.lon;
            self.triplet.previous.alt = self.global.alt;
            self.triplet.previous.valid = self.global.valid;
            let current = &mut self.triplet.current;
            current.lat = self.global.lat;
            current.lon = self.global.lon;
            current.alt = target_alt;
            current.alt_valid = true;
            current.setpoint_type = SetpointType::Takeoff;
            current.yaw = self.local.heading;
            current.yaw_valid = true;
            current.valid = true;
            current.timestamp = now;
            self.triplet.next.valid = false;
        }
        self.triplet_updated = true;
    }

    pub(super) fn takeoff_tick(&mut self, now: u64) {
        if self.takeoff.reached {
            return;
        }

        // Fresh NAV_TAKEOFF while already in takeoff replaces the target.
        if self.takeoff_triplet.current.valid {
            self.build_takeoff_triplet(now);
        }

        let target_alt = self.triplet.current.alt;
        if self.global.valid && self.global.alt >= target_alt - self.altitude_acceptance() {
            self.takeoff.reached = true;
            self.mission_result.finished = true;
            self.mission_result_updated = true;
            self.events.push(
                "navigator_takeoff_complete",
                Severity::Info,
                "Takeoff altitude reached",
            );
        }
    }

    pub(super) fn vtol_takeoff_tick(&mut self, now: u64) {
        if self.takeoff.reached {
            return;
        }

        let target_alt = if self.takeoff.transition_alt.is_finite()
            && self.takeoff.transition_alt > 0.0
        {
            self.takeoff.transition_alt
        } else if self.home.valid {
            self.home.alt + self.params.mis_takeoff_alt
        } else {
            self.global.alt + self.params.mis_takeoff_alt
        };

        if !self.triplet.current.valid {
            let current = &mut self.triplet.current;
            current.lat = self.global.lat;
            current.lon = self.global.lon;
            current.alt = target_alt;
            current.alt_valid = true;
            current.setpoint_type = SetpointType::Takeoff;
            current.valid = true;
            current.timestamp = now;
            self.triplet_updated = true;
        }

        if self.global.valid && self.global.alt >= target_alt - self.altitude_acceptance() {
            // transition altitude reached: establish on the loiter location
            let current = &mut self.triplet.current;
            if self.takeoff.loiter_lat.is_finite() && self.takeoff.loiter_lon.is_finite() {
                current.lat = self.takeoff.loiter_lat;
                current.lon = self.takeoff.loiter_lon;
            }
            current.setpoint_type = SetpointType::Loiter;
            current.loiter_radius = self.params.nav_loiter_rad;
            current.timestamp = now;
            self.triplet_updated = true;

            self.takeoff.reached = true;
            self.mission_result.finished = true;
            self.mission_result_updated = true;
        }
    }

    // ---- land ----------------------------------------------------------

    fn build_land_triplet(&mut self, now: u64) {
        let current = &mut self.triplet.current;
        current.lat = self.global.lat;
        current.lon = self.global.lon;
        current.alt = f32::NAN;
        current.alt_valid = false;
        current.setpoint_type = SetpointType::Land;
        current.yaw = self.local.heading;
        current.yaw_valid = true;
        current.valid = true;
        current.timestamp = now;
        self.triplet.previous.valid = false;
        self.triplet.next.valid = false;
        self.triplet_updated = true;
    }

    pub(super) fn land_tick(&mut self, now: u64) {
        // A landing abort converts the setpoint into a climb-out loiter.
        if self.pos_ctrl_landing.abort_landing
            && self.triplet.current.setpoint_type == SetpointType::Land
        {
            let current = &mut self.triplet.current;
            current.setpoint_type = SetpointType::Loiter;
            current.alt = self.global.alt + 20.0;
            current.alt_valid = true;
            current.loiter_radius = self.params.nav_loiter_rad;
            current.timestamp = now;
            self.triplet_updated = true;
            self.events.push(
                "navigator_landing_aborted",
                Severity::Warning,
                "Landing aborted",
            );
        }
    }

    pub(super) fn precland_tick(&mut self, now: u64) {
        // The precision refinement runs in the position controller; the
        // navigator keeps the plain land setpoint.
        self.land_tick(now);
    }
}
