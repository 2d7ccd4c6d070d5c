//! Return-to-launch.
//!
//! Sub-type selection (direct, mission landing, reversed mission, closest
//! safe point) happens on activation; the direct return itself is a small
//! phase machine: climb, return, descend, loiter, land.

use super::{ActiveMode, Navigator};
use crate::events::Severity;
use crate::geo;
use crate::navigator::modes::MissionExecutionMode;
use crate::status::{NavState, SetpointType};
use crate::traits::TimeSource;

/// Configured RTL sub-type (RTL_TYPE parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtlType {
    /// Fly to home at return altitude.
    Direct,
    /// Engage the mission-defined landing sequence if available.
    MissionLanding,
    /// Traverse the mission in reverse to reach its landing.
    MissionLandingReversed,
    /// Pick the nearest safe point (home or mission landing).
    Closest,
}

impl RtlType {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => RtlType::MissionLanding,
            2 => RtlType::MissionLandingReversed,
            3 => RtlType::Closest,
            _ => RtlType::Direct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtlPhase {
    #[default]
    Idle,
    Climb,
    Return,
    Descend,
    Loiter,
    Land,
    Landed,
}

/// Direct-return state.
#[derive(Debug, Default)]
pub struct RtlState {
    pub phase: RtlPhase,
    dest_lat: f64,
    dest_lon: f64,
    /// Ground altitude at the destination, AMSL.
    dest_alt: f32,
    /// Altitude flown during the return leg, AMSL.
    return_alt: f32,
    /// Where the initial climb happens (activation position).
    climb_lat: f64,
    climb_lon: f64,
    loiter_since: Option<u64>,
}

impl<'t, T: TimeSource> Navigator<'t, T> {
    /// Pick the mode serving AUTO_RTL, redirecting into the mission
    /// executor for the mission-landing sub-types.
    pub(super) fn select_rtl_mode(&mut self, _now: u64) -> ActiveMode {
        let rtl_activated = self.previous_nav_state != NavState::AutoRtl;

        match RtlType::from_i32(self.params.rtl_type) {
            RtlType::MissionLanding => {
                if self.mission_result.land_start_available && !self.land_detected.landed {
                    if rtl_activated {
                        self.mission.execution = MissionExecutionMode::FastForward;
                        self.mission
                            .set_current(self.mission_result.land_start_index, &self.plan);
                        self.events.push(
                            "navigator_rtl_mission_activated",
                            Severity::Info,
                            "RTL Mission activated, continue mission",
                        );
                    }
                    ActiveMode::Mission
                } else {
                    if rtl_activated {
                        self.events.push(
                            "navigator_rtl_home_activated",
                            Severity::Info,
                            "RTL activated",
                        );
                    }
                    ActiveMode::Rtl
                }
            }

            RtlType::MissionLandingReversed => {
                if self.plan.has_landing()
                    && self.mission_result.valid
                    && !self.mission.finished
                    && !self.land_detected.landed
                {
                    if rtl_activated {
                        self.mission.execution = MissionExecutionMode::Reverse;
                        let closest = self.closest_mission_item();
                        self.mission.set_current(closest, &self.plan);
                        self.events.push(
                            "navigator_rtl_mission_activated_rev",
                            Severity::Info,
                            "RTL Mission activated, fly mission in reverse",
                        );
                    }
                    ActiveMode::Mission
                } else {
                    if rtl_activated {
                        self.events.push(
                            "navigator_rtl_mission_activated_home",
                            Severity::Info,
                            "RTL Mission activated, fly to home",
                        );
                    }
                    ActiveMode::Rtl
                }
            }

            RtlType::Direct | RtlType::Closest => {
                if rtl_activated {
                    self.events.push(
                        "navigator_rtl_home_activated",
                        Severity::Info,
                        "RTL activated",
                    );
                }
                ActiveMode::Rtl
            }
        }
    }

    /// Nearest NAV item of the current plan.
    fn closest_mission_item(&self) -> u16 {
        let mut best = 0u16;
        let mut best_dist = f64::MAX;
        for (index, item) in self.plan.items.iter().enumerate() {
            if !item.is_nav() || !item.lat.is_finite() {
                continue;
            }
            let dist = geo::distance(self.global.lat, self.global.lon, item.lat, item.lon);
            if dist < best_dist {
                best_dist = dist;
                best = index as u16;
            }
        }
        best
    }

    /// Activation: pick the destination and the return altitude.
    pub(super) fn rtl_entry(&mut self, _now: u64) {
        let (mut dest_lat, mut dest_lon, mut dest_alt) = if self.home.valid {
            (self.home.lat, self.home.lon, self.home.alt)
        } else {
            (self.global.lat, self.global.lon, self.global.alt)
        };

        // The closest sub-type may prefer the mission landing point.
        if RtlType::from_i32(self.params.rtl_type) == RtlType::Closest {
            if let Some(land) = self.plan.items.iter().find(|item| item.is_land()) {
                if land.lat.is_finite() {
                    let home_dist =
                        geo::distance(self.global.lat, self.global.lon, dest_lat, dest_lon);
                    let land_dist =
                        geo::distance(self.global.lat, self.global.lon, land.lat, land.lon);
                    if land_dist < home_dist {
                        dest_lat = land.lat;
                        dest_lon = land.lon;
                        dest_alt = if land.alt_is_relative && self.home.valid {
                            self.home.alt + land.alt
                        } else {
                            land.alt
                        };
                    }
                }
            }
        }

        let return_alt = (dest_alt + self.params.rtl_return_alt).max(self.global.alt);

        self.rtl = RtlState {
            phase: RtlPhase::Climb,
            dest_lat,
            dest_lon,
            dest_alt,
            return_alt,
            climb_lat: self.global.lat,
            climb_lon: self.global.lon,
            loiter_since: None,
        };
    }

    pub(super) fn rtl_tick(&mut self, now: u64) {
        match self.rtl.phase {
            RtlPhase::Idle => {
                self.rtl_entry(now);
            }

            RtlPhase::Climb => {
                if self.global.alt >= self.rtl.return_alt - self.altitude_acceptance() {
                    self.rtl.phase = RtlPhase::Return;
                } else {
                    self.set_rtl_setpoint(
                        self.rtl.climb_lat,
                        self.rtl.climb_lon,
                        self.rtl.return_alt,
                        SetpointType::Loiter,
                        now,
                    );
                }
            }

            RtlPhase::Return => {
                self.set_rtl_setpoint(
                    self.rtl.dest_lat,
                    self.rtl.dest_lon,
                    self.rtl.return_alt,
                    SetpointType::Position,
                    now,
                );
                let dist = geo::distance(
                    self.global.lat,
                    self.global.lon,
                    self.rtl.dest_lat,
                    self.rtl.dest_lon,
                ) as f32;
                if dist < self.acceptance_radius() {
                    self.rtl.phase = RtlPhase::Descend;
                }
            }

            RtlPhase::Descend => {
                let descend_alt = self.rtl.dest_alt + self.params.rtl_descend_alt;
                self.set_rtl_setpoint(
                    self.rtl.dest_lat,
                    self.rtl.dest_lon,
                    descend_alt,
                    SetpointType::Loiter,
                    now,
                );
                if self.global.alt <= descend_alt + self.altitude_acceptance() {
                    if self.params.rtl_land_delay == 0.0 {
                        self.rtl.phase = RtlPhase::Land;
                    } else {
                        self.rtl.phase = RtlPhase::Loiter;
                        self.rtl.loiter_since = Some(now);
                    }
                }
            }

            RtlPhase::Loiter => {
                // a negative delay loiters until the operator intervenes
                if self.params.rtl_land_delay >= 0.0 {
                    let delay_us = (self.params.rtl_land_delay * 1e6) as u64;
                    let since = *self.rtl.loiter_since.get_or_insert(now);
                    if now.saturating_sub(since) >= delay_us {
                        self.rtl.phase = RtlPhase::Land;
                    }
                }
                self.can_loiter_at_sp = true;
            }

            RtlPhase::Land => {
                self.set_rtl_setpoint(
                    self.rtl.dest_lat,
                    self.rtl.dest_lon,
                    self.rtl.dest_alt,
                    SetpointType::Land,
                    now,
                );
                if self.land_detected.landed {
                    self.rtl.phase = RtlPhase::Landed;
                    self.events.push(
                        "navigator_rtl_landed",
                        Severity::Info,
                        "RTL: completed, landed",
                    );
                }
            }

            RtlPhase::Landed => {}
        }
    }

    fn set_rtl_setpoint(
        &mut self,
        lat: f64,
        lon: f64,
        alt: f32,
        setpoint_type: SetpointType,
        now: u64,
    ) {
        let current = &mut self.triplet.current;
        let unchanged = current.valid
            && current.setpoint_type == setpoint_type
            && current.lat == lat
            && current.lon == lon
            && current.alt == alt;
        if unchanged {
            return;
        }

        let acceptance_radius = self.acceptance_radius();
        let cruising_speed = self.cruising_speed();
        let cruising_throttle = self.cruising_throttle();

        self.triplet.previous.lat = self.global.lat;
        self.triplet.previous.lon = self.global.lon;
        self.triplet.previous.alt = self.global.alt;
        self.triplet.previous.valid = self.global.valid;

        let current = &mut self.triplet.current;
        current.lat = lat;
        current.lon = lon;
        current.alt = alt;
        current.alt_valid = true;
        current.setpoint_type = setpoint_type;
        current.loiter_radius = self.params.nav_loiter_rad;
        current.acceptance_radius = acceptance_radius;
        current.cruising_speed = cruising_speed;
        current.cruising_throttle = cruising_throttle;
        current.yaw = f32::NAN;
        current.yaw_valid = false;
        current.valid = true;
        current.timestamp = now;

        self.triplet.next.valid = false;
        self.triplet_updated = true;
    }
}
