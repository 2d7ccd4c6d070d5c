//! Telemetry link monitor.
//!
//! Tracks the last heartbeat per link role (GCS, onboard controller,
//! parachute system, OpenDroneID, avoidance, high-latency) with one
//! configurable timeout and a regain edge each. A USB link acts as a
//! sticky connected flag.

use crate::events::{EventBuffer, Severity};
use crate::status::{IridiumStatus, LinkType, TelemetryStatus, VehicleStatus};

/// Fixed role timeouts (the configurable ones come from parameters).
const PARACHUTE_TIMEOUT_US: u64 = 3_000_000;
const OPEN_DRONE_ID_TIMEOUT_US: u64 = 3_000_000;
const AVOIDANCE_TIMEOUT_US: u64 = 5_000_000;

/// Link monitor tuning, loaded from the commander parameters.
#[derive(Debug, Clone, Copy)]
pub struct LinkTimeouts {
    pub gcs_loss_us: u64,
    pub onboard_loss_us: u64,
    pub high_latency_loss_us: u64,
    pub high_latency_regain_us: u64,
}

#[derive(Debug, Default)]
pub struct LinkMonitor {
    last_heartbeat_gcs: u64,
    last_heartbeat_onboard: u64,
    last_heartbeat_parachute: u64,
    last_heartbeat_open_drone_id: u64,
    last_heartbeat_avoidance: u64,
    high_latency_heartbeat: u64,
    high_latency_lost_time: u64,
    onboard_lost: bool,
    parachute_lost: bool,
    open_drone_id_lost: bool,
    avoidance_lost: bool,
    parachute_present: bool,
    parachute_healthy: bool,
    avoidance_valid: bool,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parachute_system_present(&self) -> bool {
        self.parachute_present
    }

    pub fn parachute_system_healthy(&self) -> bool {
        self.parachute_healthy
    }

    pub fn avoidance_system_valid(&self) -> bool {
        self.avoidance_valid
    }

    /// Fold one telemetry report into the per-role bookkeeping.
    pub fn process_telemetry(
        &mut self,
        telemetry: &TelemetryStatus,
        status: &mut VehicleStatus,
        events: &mut EventBuffer,
    ) {
        if telemetry.link_type == LinkType::Usb {
            // sticky until reboot
            status.usb_connected = true;
        }

        if telemetry.heartbeat_gcs {
            if status.data_link_lost {
                status.data_link_lost = false;
                if self.last_heartbeat_gcs != 0 {
                    events.push("commander_dl_regained", Severity::Info, "Data link regained");
                }
            }
            self.last_heartbeat_gcs = telemetry.timestamp;
        }

        if telemetry.heartbeat_onboard_controller {
            if self.onboard_lost {
                self.onboard_lost = false;
                if self.last_heartbeat_onboard != 0 {
                    events.push(
                        "commander_onboard_ctrl_regained",
                        Severity::Info,
                        "Onboard controller regained",
                    );
                }
            }
            self.last_heartbeat_onboard = telemetry.timestamp;
        }

        if telemetry.heartbeat_parachute {
            if self.parachute_lost {
                self.parachute_lost = false;
                if self.last_heartbeat_parachute != 0 {
                    events.push(
                        "commander_parachute_regained",
                        Severity::Info,
                        "Parachute system regained",
                    );
                }
            }
            self.last_heartbeat_parachute = telemetry.timestamp;
            self.parachute_present = true;
            self.parachute_healthy = telemetry.parachute_system_healthy;
        }

        if telemetry.heartbeat_open_drone_id {
            if self.open_drone_id_lost {
                self.open_drone_id_lost = false;
                if self.last_heartbeat_open_drone_id != 0 {
                    events.push(
                        "commander_open_drone_id_regained",
                        Severity::Info,
                        "OpenDroneID system regained",
                    );
                }
            }
            self.last_heartbeat_open_drone_id = telemetry.timestamp;
        }

        if telemetry.heartbeat_avoidance {
            self.avoidance_lost = false;
            self.last_heartbeat_avoidance = telemetry.timestamp;
            self.avoidance_valid = telemetry.avoidance_system_healthy;
        }
    }

    /// Fold a high-latency modem report.
    pub fn process_iridium(
        &mut self,
        iridium: &IridiumStatus,
        regain_timeout_us: u64,
        status: &mut VehicleStatus,
        now_us: u64,
    ) {
        self.high_latency_heartbeat = iridium.last_heartbeat;

        if status.high_latency_data_link_lost
            && now_us.saturating_sub(self.high_latency_lost_time) > regain_timeout_us
        {
            status.high_latency_data_link_lost = false;
        }
    }

    /// Evaluate all role timeouts. Emits the single loss event per edge.
    pub fn check_timeouts(
        &mut self,
        timeouts: &LinkTimeouts,
        status: &mut VehicleStatus,
        events: &mut EventBuffer,
        now_us: u64,
    ) {
        // GCS loss
        if !status.data_link_lost
            && self.last_heartbeat_gcs != 0
            && now_us.saturating_sub(self.last_heartbeat_gcs) > timeouts.gcs_loss_us
        {
            status.data_link_lost = true;
            status.data_link_lost_counter = status.data_link_lost_counter.wrapping_add(1);
            events.push(
                "commander_gcs_lost",
                Severity::Warning,
                "Connection to ground station lost",
            );
        }

        // Onboard controller loss
        if !self.onboard_lost
            && self.last_heartbeat_onboard != 0
            && now_us.saturating_sub(self.last_heartbeat_onboard) > timeouts.onboard_loss_us
        {
            self.onboard_lost = true;
            events.push(
                "commander_mission_comp_lost",
                Severity::Critical,
                "Connection to mission computer lost",
            );
        }

        // Parachute system
        if !self.parachute_lost
            && self.last_heartbeat_parachute != 0
            && now_us.saturating_sub(self.last_heartbeat_parachute) > PARACHUTE_TIMEOUT_US
        {
            self.parachute_lost = true;
            self.parachute_present = false;
            self.parachute_healthy = false;
            events.push(
                "commander_parachute_lost",
                Severity::Critical,
                "Parachute system lost",
            );
        }

        // OpenDroneID system
        if !self.open_drone_id_lost
            && self.last_heartbeat_open_drone_id != 0
            && now_us.saturating_sub(self.last_heartbeat_open_drone_id) > OPEN_DRONE_ID_TIMEOUT_US
        {
            self.open_drone_id_lost = true;
            events.push(
                "commander_open_drone_id_lost",
                Severity::Critical,
                "OpenDroneID system lost",
            );
        }

        // Avoidance system
        if !self.avoidance_lost
            && self.last_heartbeat_avoidance != 0
            && now_us.saturating_sub(self.last_heartbeat_avoidance) > AVOIDANCE_TIMEOUT_US
        {
            self.avoidance_lost = true;
            self.avoidance_valid = false;
        }

        // High-latency link
        if self.high_latency_heartbeat != 0
            && now_us.saturating_sub(self.high_latency_heartbeat) > timeouts.high_latency_loss_us
        {
            self.high_latency_lost_time = now_us;
            if !status.high_latency_data_link_lost {
                status.high_latency_data_link_lost = true;
                events.push(
                    "commander_high_latency_lost",
                    Severity::Critical,
                    "High latency data link lost",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> LinkTimeouts {
        LinkTimeouts {
            gcs_loss_us: 10_000_000,
            onboard_loss_us: 5_000_000,
            high_latency_loss_us: 120_000_000,
            high_latency_regain_us: 0,
        }
    }

    fn gcs_heartbeat(t: u64) -> TelemetryStatus {
        TelemetryStatus {
            heartbeat_gcs: true,
            timestamp: t,
            ..Default::default()
        }
    }

    #[test]
    fn gcs_loss_after_timeout_single_event() {
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        status.data_link_lost = false;
        let mut events = EventBuffer::new();

        monitor.process_telemetry(&gcs_heartbeat(1_000_000), &mut status, &mut events);
        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 5_000_000);
        assert!(!status.data_link_lost);

        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 12_000_000);
        assert!(status.data_link_lost);
        assert!(events.contains("commander_gcs_lost"));
        assert_eq!(events.len(), 1);

        // a second evaluation must not emit again
        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 13_000_000);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn gcs_regain_emits_event() {
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        status.data_link_lost = false;
        let mut events = EventBuffer::new();

        monitor.process_telemetry(&gcs_heartbeat(1_000_000), &mut status, &mut events);
        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 12_000_000);
        assert!(status.data_link_lost);

        events.clear();
        monitor.process_telemetry(&gcs_heartbeat(13_000_000), &mut status, &mut events);
        assert!(!status.data_link_lost);
        assert!(events.contains("commander_dl_regained"));
    }

    #[test]
    fn first_heartbeat_regain_is_silent() {
        // boot state has data_link_lost = true; the first heartbeat clears
        // it without a "regained" event
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        assert!(status.data_link_lost);
        let mut events = EventBuffer::new();

        monitor.process_telemetry(&gcs_heartbeat(1_000_000), &mut status, &mut events);
        assert!(!status.data_link_lost);
        assert!(events.is_empty());
    }

    #[test]
    fn usb_is_sticky() {
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        let mut events = EventBuffer::new();

        let usb = TelemetryStatus {
            link_type: LinkType::Usb,
            timestamp: 1,
            ..Default::default()
        };
        monitor.process_telemetry(&usb, &mut status, &mut events);
        assert!(status.usb_connected);

        // no unset path
        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 100_000_000);
        assert!(status.usb_connected);
    }

    #[test]
    fn parachute_role_tracking() {
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        let mut events = EventBuffer::new();

        let parachute = TelemetryStatus {
            heartbeat_parachute: true,
            parachute_system_healthy: true,
            timestamp: 1_000_000,
            ..Default::default()
        };
        monitor.process_telemetry(&parachute, &mut status, &mut events);
        assert!(monitor.parachute_system_present());
        assert!(monitor.parachute_system_healthy());

        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 4_100_000);
        assert!(!monitor.parachute_system_present());
        assert!(events.contains("commander_parachute_lost"));
    }

    #[test]
    fn high_latency_loss_and_regain() {
        let mut monitor = LinkMonitor::new();
        let mut status = VehicleStatus::default();
        let mut events = EventBuffer::new();

        let iridium = IridiumStatus {
            last_heartbeat: 1_000_000,
            timestamp: 1_000_000,
        };
        monitor.process_iridium(&iridium, 0, &mut status, 1_000_000);
        monitor.check_timeouts(&timeouts(), &mut status, &mut events, 130_000_000);
        assert!(status.high_latency_data_link_lost);
        assert!(events.contains("commander_high_latency_lost"));

        let iridium = IridiumStatus {
            last_heartbeat: 131_000_000,
            timestamp: 131_000_000,
        };
        monitor.process_iridium(&iridium, 0, &mut status, 131_000_000);
        assert!(!status.high_latency_data_link_lost);
    }
}
