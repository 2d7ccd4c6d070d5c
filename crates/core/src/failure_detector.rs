//! Airframe failure detector.
//!
//! Aggregates attitude, altitude-loss, ESC, motor, propeller-imbalance and
//! external fault inputs into debounced status flags. Each flag has its own
//! debounce so a transient cannot trip a lockdown or termination.

use crate::hysteresis::Hysteresis;
use crate::params::{ParamFlags, ParamValue, ParameterStore};
use libm::fabsf;

bitflags::bitflags! {
    /// Debounced failure flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FailureFlags: u8 {
        const ROLL = 1 << 0;
        const PITCH = 1 << 1;
        const ALT = 1 << 2;
        const EXT = 1 << 3;
        const ARM_ESCS = 1 << 4;
        const MOTOR = 1 << 5;
        const IMBALANCED_PROP = 1 << 6;
    }
}

/// Published detector status.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FailureDetectorStatus {
    pub flags: FailureFlags,
    pub imbalanced_prop_metric: f32,
    pub motor_failure_mask: u8,
    pub timestamp: u64,
}

/// Raw per-tick detector inputs.
#[derive(Debug, Clone, Copy)]
pub struct FailureDetectorInput {
    /// Roll angle, radians.
    pub roll: f32,
    /// Pitch angle, radians.
    pub pitch: f32,
    /// Climb rate, m/s (negative = sinking).
    pub climb_rate: f32,
    /// External automatic trigger system input.
    pub external_trigger: bool,
    /// All ESCs acknowledged the arm request.
    pub escs_responding: bool,
    /// Per-motor failure bits from the ESC telemetry.
    pub motor_failure_mask: u8,
    /// Accelerometer variance metric for propeller imbalance.
    pub imbalance_metric: f32,
}

impl Default for FailureDetectorInput {
    fn default() -> Self {
        Self {
            roll: 0.0,
            pitch: 0.0,
            climb_rate: 0.0,
            external_trigger: false,
            // absent ESC telemetry is not an arm failure
            escs_responding: true,
            motor_failure_mask: 0,
            imbalance_metric: 0.0,
        }
    }
}

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct FailureDetectorParams {
    /// Maximum roll angle, degrees (0 disables).
    pub fail_roll_deg: f32,
    /// Maximum pitch angle, degrees (0 disables).
    pub fail_pitch_deg: f32,
    /// Attitude debounce, seconds.
    pub fail_att_debounce: f32,
    /// Maximum sink rate, m/s (0 disables).
    pub fail_alt_sink: f32,
    /// Altitude-loss debounce, seconds.
    pub fail_alt_debounce: f32,
    /// External trigger debounce, seconds.
    pub fail_ext_debounce: f32,
    /// Imbalance metric threshold (< 0 disables).
    pub imb_prop_thr: f32,
}

impl FailureDetectorParams {
    pub fn register_defaults(store: &mut ParameterStore) {
        let defs: &[(&str, ParamValue)] = &[
            ("FD_FAIL_R", ParamValue::Float(60.0)),
            ("FD_FAIL_P", ParamValue::Float(60.0)),
            ("FD_FAIL_TTRI", ParamValue::Float(0.3)),
            ("FD_FAIL_ALT", ParamValue::Float(0.0)),
            ("FD_FAIL_ALT_TTRI", ParamValue::Float(1.0)),
            ("FD_EXT_TTRI", ParamValue::Float(0.1)),
            ("FD_IMB_PROP_THR", ParamValue::Float(30.0)),
        ];
        for (name, value) in defs {
            let _ = store.register(name, *value, ParamFlags::empty());
        }
    }

    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            fail_roll_deg: store.get_float("FD_FAIL_R", 60.0),
            fail_pitch_deg: store.get_float("FD_FAIL_P", 60.0),
            fail_att_debounce: store.get_float("FD_FAIL_TTRI", 0.3),
            fail_alt_sink: store.get_float("FD_FAIL_ALT", 0.0),
            fail_alt_debounce: store.get_float("FD_FAIL_ALT_TTRI", 1.0),
            fail_ext_debounce: store.get_float("FD_EXT_TTRI", 0.1),
            imb_prop_thr: store.get_float("FD_IMB_PROP_THR", 30.0),
        }
    }
}

impl Default for FailureDetectorParams {
    fn default() -> Self {
        Self {
            fail_roll_deg: 60.0,
            fail_pitch_deg: 60.0,
            fail_att_debounce: 0.3,
            fail_alt_sink: 0.0,
            fail_alt_debounce: 1.0,
            fail_ext_debounce: 0.1,
            imb_prop_thr: 30.0,
        }
    }
}

/// The detector. Call [`update`](FailureDetector::update) every tick.
pub struct FailureDetector {
    params: FailureDetectorParams,
    status: FailureDetectorStatus,
    roll_debounce: Hysteresis,
    pitch_debounce: Hysteresis,
    alt_debounce: Hysteresis,
    ext_debounce: Hysteresis,
}

impl FailureDetector {
    pub fn new(params: FailureDetectorParams) -> Self {
        let mut detector = Self {
            params: FailureDetectorParams::default(),
            status: FailureDetectorStatus::default(),
            roll_debounce: Hysteresis::new(false),
            pitch_debounce: Hysteresis::new(false),
            alt_debounce: Hysteresis::new(false),
            ext_debounce: Hysteresis::new(false),
        };
        detector.set_params(params);
        detector
    }

    /// Swap tuning (only while disarmed).
    pub fn set_params(&mut self, params: FailureDetectorParams) {
        let att_us = (params.fail_att_debounce * 1e6) as u64;
        let alt_us = (params.fail_alt_debounce * 1e6) as u64;
        let ext_us = (params.fail_ext_debounce * 1e6) as u64;
        self.roll_debounce.set_hysteresis_time_from(false, att_us);
        self.pitch_debounce.set_hysteresis_time_from(false, att_us);
        self.alt_debounce.set_hysteresis_time_from(false, alt_us);
        self.ext_debounce.set_hysteresis_time_from(false, ext_us);
        self.params = params;
    }

    pub fn status(&self) -> FailureDetectorStatus {
        self.status
    }

    pub fn flags(&self) -> FailureFlags {
        self.status.flags
    }

    /// Evaluate one tick. Returns true when any published field changed.
    pub fn update(&mut self, input: &FailureDetectorInput, armed: bool, now_us: u64) -> bool {
        let previous = self.status;

        let mut flags = FailureFlags::empty();

        const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;
        let roll_deg = fabsf(input.roll) * RAD_TO_DEG;
        let pitch_deg = fabsf(input.pitch) * RAD_TO_DEG;

        let roll_exceeded = self.params.fail_roll_deg > 0.0 && roll_deg > self.params.fail_roll_deg;
        let pitch_exceeded =
            self.params.fail_pitch_deg > 0.0 && pitch_deg > self.params.fail_pitch_deg;
        let sinking = self.params.fail_alt_sink > 0.0
            && input.climb_rate < -self.params.fail_alt_sink;

        flags.set(
            FailureFlags::ROLL,
            self.roll_debounce.set_state_and_update(roll_exceeded, now_us),
        );
        flags.set(
            FailureFlags::PITCH,
            self.pitch_debounce.set_state_and_update(pitch_exceeded, now_us),
        );
        flags.set(
            FailureFlags::ALT,
            self.alt_debounce.set_state_and_update(sinking, now_us),
        );
        flags.set(
            FailureFlags::EXT,
            self.ext_debounce
                .set_state_and_update(input.external_trigger, now_us),
        );

        // ESC arm response and motor failures come pre-debounced from the
        // ESC telemetry aggregation.
        flags.set(FailureFlags::ARM_ESCS, armed && !input.escs_responding);
        flags.set(FailureFlags::MOTOR, input.motor_failure_mask != 0);
        flags.set(
            FailureFlags::IMBALANCED_PROP,
            self.params.imb_prop_thr >= 0.0 && input.imbalance_metric > self.params.imb_prop_thr,
        );

        self.status = FailureDetectorStatus {
            flags,
            imbalanced_prop_metric: input.imbalance_metric,
            motor_failure_mask: input.motor_failure_mask,
            timestamp: now_us,
        };

        self.status.flags != previous.flags
            || self.status.motor_failure_mask != previous.motor_failure_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> FailureDetector {
        FailureDetector::new(FailureDetectorParams::default())
    }

    fn tilted(roll_deg: f32) -> FailureDetectorInput {
        FailureDetectorInput {
            roll: roll_deg * core::f32::consts::PI / 180.0,
            escs_responding: true,
            ..Default::default()
        }
    }

    fn nominal() -> FailureDetectorInput {
        FailureDetectorInput {
            escs_responding: true,
            ..Default::default()
        }
    }

    #[test]
    fn level_flight_has_no_flags() {
        let mut fd = detector();
        fd.update(&nominal(), true, 0);
        assert!(fd.flags().is_empty());
    }

    #[test]
    fn roll_failure_requires_debounce() {
        let mut fd = detector();

        // 0.3 s debounce at 10 ms ticks
        let mut t = 0;
        fd.update(&tilted(80.0), true, t);
        assert!(!fd.flags().contains(FailureFlags::ROLL));

        t = 200_000;
        fd.update(&tilted(80.0), true, t);
        assert!(!fd.flags().contains(FailureFlags::ROLL));

        t = 300_000;
        let changed = fd.update(&tilted(80.0), true, t);
        assert!(changed);
        assert!(fd.flags().contains(FailureFlags::ROLL));
    }

    #[test]
    fn transient_tilt_does_not_trip() {
        let mut fd = detector();
        fd.update(&tilted(80.0), true, 0);
        fd.update(&nominal(), true, 100_000);
        fd.update(&tilted(80.0), true, 200_000);
        fd.update(&tilted(80.0), true, 400_000);
        // timer restarted at 200 ms, 0.3 s not yet elapsed
        assert!(!fd.flags().contains(FailureFlags::ROLL));
    }

    #[test]
    fn esc_arm_failure_only_while_armed() {
        let mut fd = detector();
        let mut input = nominal();
        input.escs_responding = false;

        fd.update(&input, false, 0);
        assert!(!fd.flags().contains(FailureFlags::ARM_ESCS));

        fd.update(&input, true, 10_000);
        assert!(fd.flags().contains(FailureFlags::ARM_ESCS));
    }

    #[test]
    fn motor_failure_edge_reports_change() {
        let mut fd = detector();
        assert!(!fd.update(&nominal(), true, 0));

        let mut input = nominal();
        input.motor_failure_mask = 0b0100;
        assert!(fd.update(&input, true, 10_000));
        assert!(fd.flags().contains(FailureFlags::MOTOR));
        assert_eq!(fd.status().motor_failure_mask, 0b0100);

        // steady state: no further change reported
        assert!(!fd.update(&input, true, 20_000));
    }

    #[test]
    fn imbalance_threshold() {
        let mut fd = detector();
        let mut input = nominal();
        input.imbalance_metric = 25.0;
        fd.update(&input, true, 0);
        assert!(!fd.flags().contains(FailureFlags::IMBALANCED_PROP));

        input.imbalance_metric = 35.0;
        fd.update(&input, true, 10_000);
        assert!(fd.flags().contains(FailureFlags::IMBALANCED_PROP));
    }

    #[test]
    fn disabled_thresholds_never_trip() {
        let mut fd = FailureDetector::new(FailureDetectorParams {
            fail_roll_deg: 0.0,
            fail_pitch_deg: 0.0,
            imb_prop_thr: -1.0,
            ..Default::default()
        });

        let mut input = tilted(170.0);
        input.imbalance_metric = 1000.0;
        for t in 0..10 {
            fd.update(&input, true, t * 100_000);
        }
        assert!(!fd.flags().contains(FailureFlags::ROLL));
        assert!(!fd.flags().contains(FailureFlags::IMBALANCED_PROP));
    }
}
