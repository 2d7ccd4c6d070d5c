//! End-to-end flight scenarios driven through the SITL harness.

use strato_core::geo;
use strato_core::params::ParamValue;
use strato_core::status::command_ids;
use strato_core::status::{
    ActionRequestAction, ActionRequestSource, ArmingState, CommandResult, MainState, NavState,
    SetpointType, TuneId, VehicleCommand,
};
use strato_sitl::sim::{GROUND_ALT, HOME_LAT, HOME_LON};
use strato_sitl::{SimVehicle, SimpleFence};

const CUSTOM_MAIN_MODE_POSCTL: u8 = 3;
const CUSTOM_MAIN_MODE_AUTO: u8 = 4;
const CUSTOM_SUB_MODE_AUTO_TAKEOFF: u8 = 2;

/// S1: ground arm, takeoff, land, auto-disarm.
#[test]
fn s1_ground_arm_takeoff_land_auto_disarm() {
    let mut sim = SimVehicle::new();
    sim.boot();
    assert_eq!(sim.commander.status().arming_state, ArmingState::Standby);

    // home set by explicit command
    sim.set_home_command();
    sim.run_ms(50);
    assert!(sim.commander.home_valid());

    // operator selects takeoff, then arms
    sim.set_mode_command(CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_TAKEOFF);
    sim.run_ms(50);
    assert_eq!(sim.commander.internal_state().main_state, MainState::AutoTakeoff);

    sim.arm_command(false);
    sim.run_ms(50);
    assert_eq!(sim.commander.status().arming_state, ArmingState::Armed);
    assert_eq!(sim.commander.status().nav_state, NavState::AutoTakeoff);

    // climb to the takeoff altitude; takeoff completion hands over to hold
    sim.run_ms(4_000);
    assert!(!sim.model.landed);
    assert_eq!(sim.commander.status().nav_state, NavState::AutoLoiter);

    // triplet preservation: the loiter altitude is the takeoff altitude
    let triplet = sim.topics.position_setpoint_triplet.read().unwrap();
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    let takeoff_alt = GROUND_ALT + 2.5; // home alt + MIS_TAKEOFF_ALT
    assert!((triplet.current.alt - takeoff_alt).abs() < 0.01);

    sim.drain_events();

    // touchdown: landed holds for COM_DISARM_LAND (2 s) -> auto disarm
    sim.sensors.land_override = Some(true);
    sim.run_ms(2_500);
    assert_eq!(sim.commander.status().arming_state, ArmingState::Standby);

    let events = sim.drain_events();
    assert!(events.iter().any(|e| e.id == "commander_landing_detected"));
    assert!(events.iter().any(|e| e.id == "commander_disarmed_by"));
}

/// S2: kill switch in the air.
#[test]
fn s2_kill_switch_in_air() {
    let mut sim = SimVehicle::new();
    sim.boot();
    sim.set_home_command();
    sim.run_ms(50);
    sim.set_mode_command(CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_TAKEOFF);
    sim.run_ms(50);
    sim.arm_command(false);
    sim.run_ms(4_000);
    assert!(!sim.model.landed);

    let command_sub = sim.topics.vehicle_command.subscribe();
    command_sub.copy(); // mark current generation read

    sim.send_action(ActionRequestSource::RcSwitch, ActionRequestAction::Kill, None);
    sim.run_ms(50);

    // motors off immediately, parachute commanded, release tune played
    assert!(sim.commander.actuator_armed().manual_lockdown());
    let parachute = command_sub.copy().unwrap();
    assert_eq!(parachute.command, command_ids::DO_PARACHUTE);
    assert_eq!(parachute.target_component, 161);
    let tune = sim.topics.tune_control.read().unwrap();
    assert_eq!(tune.tune, TuneId::ParachuteRelease);

    let events = sim.drain_events();
    assert!(events.iter().any(|e| e.id == "commander_kill_sw_engaged"));

    // still armed until the 5 s confirmation elapses
    assert!(sim.commander.is_armed());
    sim.run_ms(5_200);
    assert!(!sim.commander.is_armed());
}

/// S3: GCS link loss with RC present.
#[test]
fn s3_gcs_link_loss_triggers_configured_action() {
    let mut sim = SimVehicle::new();
    // RTL on data link loss
    sim.set_param("NAV_DLL_ACT", ParamValue::Int(2));
    sim.sensors.rc_valid = true;
    sim.boot();
    sim.set_home_command();
    sim.run_ms(50);

    // fly a mission
    sim.upload_mission(&[(HOME_LAT + 0.01, HOME_LON), (HOME_LAT + 0.02, HOME_LON)], 50.0);
    sim.run_ms(100);
    let mut start = VehicleCommand::internal(command_ids::MISSION_START);
    start.param1 = 0.0;
    sim.send_command(start);
    sim.run_ms(100);
    assert!(sim.commander.is_armed());
    assert_eq!(sim.commander.status().nav_state, NavState::AutoMission);

    sim.run_ms(5_000);
    sim.drain_events();

    // GCS goes quiet; COM_DL_LOSS_T is 10 s
    sim.sensors.gcs_heartbeat = false;
    sim.run_ms(10_200);

    assert!(sim.commander.status().data_link_lost);
    assert_eq!(sim.commander.status().nav_state, NavState::AutoRtl);
    assert!(sim.commander.status().failsafe);

    let events = sim.drain_events();
    let gcs_lost = events.iter().filter(|e| e.id == "commander_gcs_lost").count();
    assert_eq!(gcs_lost, 1);
}

/// S4: force-arm despite failed arming gates.
#[test]
fn s4_force_arm_skips_checks() {
    let mut sim = SimVehicle::new();
    // RC present with mid throttle: the high-throttle gate denies arming
    sim.sensors.rc_valid = true;
    sim.sensors.rc_throttle = 0.5;
    sim.boot();
    assert_eq!(sim.commander.status().arming_state, ArmingState::Standby);

    sim.arm_command(false);
    sim.run_ms(50);
    assert!(!sim.commander.is_armed());
    let acks = sim.drain_acks();
    assert_eq!(acks.last().unwrap().result, CommandResult::TemporarilyRejected);

    // the magic sentinel skips the gates entirely
    sim.arm_command(true);
    sim.run_ms(50);
    assert!(sim.commander.is_armed());
    assert!(sim.commander.status().armed_time > 0);
    // boot holdoff long past: home was set on arming
    assert!(sim.commander.home_valid());
    let acks = sim.drain_acks();
    assert_eq!(acks.last().unwrap().result, CommandResult::Accepted);
}

/// S5: predicted geofence breach on a rotary wing commands a loiter
/// inside the fence.
#[test]
fn s5_geofence_predicted_breach_loiters_inside_fence() {
    let fence = SimpleFence::circle(HOME_LAT, HOME_LON, 200.0);
    let mut sim = SimVehicle::with_fence(fence);
    sim.set_param("GF_ACTION", ParamValue::Int(2)); // loiter
    sim.boot();
    sim.set_home_command();
    sim.run_ms(50);

    // mission waypoint well beyond the fence, ~1.1 km north
    sim.upload_mission(&[(HOME_LAT + 0.01, HOME_LON)], 20.0);
    sim.run_ms(100);
    let mut start = VehicleCommand::internal(command_ids::MISSION_START);
    start.param1 = 0.0;
    sim.send_command(start);
    sim.run_ms(100);
    assert!(sim.commander.is_armed());

    // fly north at cruise speed until the predictor trips (fence edge at
    // 200 m, ~5 m/s ground speed)
    sim.run_ms(60_000);

    assert_eq!(sim.commander.status().nav_state, NavState::AutoLoiter);
    let triplet = sim.topics.position_setpoint_triplet.read().unwrap();
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    let dist_from_home = geo::distance(
        triplet.current.lat,
        triplet.current.lon,
        HOME_LAT,
        HOME_LON,
    );
    assert!(dist_from_home < 200.0, "loiter point outside fence: {dist_from_home} m");

    let events = sim.drain_events();
    assert!(events.iter().any(|e| e.id == "navigator_geofence_violation"));
}

/// S6: reboot request while armed is denied.
#[test]
fn s6_reboot_denied_while_armed() {
    let mut sim = SimVehicle::new();
    sim.boot();
    sim.set_home_command();
    sim.run_ms(50);
    sim.set_mode_command(CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_TAKEOFF);
    sim.run_ms(50);
    sim.arm_command(false);
    sim.run_ms(50);
    assert!(sim.commander.is_armed());
    sim.drain_acks();

    let mut reboot = VehicleCommand::internal(command_ids::PREFLIGHT_REBOOT_SHUTDOWN);
    reboot.param1 = 1.0;
    sim.send_command(reboot);
    sim.run_ms(50);

    let acks = sim.drain_acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].result, CommandResult::Denied);
    assert!(sim.commander.is_armed());
    assert!(!sim.commander.should_exit());
}

/// A GCS-only manual-control source installs POSCTL as the initial mode.
#[test]
fn mavlink_sticks_install_posctl() {
    let mut sim = SimVehicle::new();
    sim.sensors.rc_valid = true;
    sim.sensors.rc_source = strato_core::status::ManualControlSource::Mavlink;
    sim.boot();
    assert_eq!(sim.commander.internal_state().main_state, MainState::Posctl);
}

/// Disarmed, RC lost, no operator choice: wait in hold for a tablet user.
#[test]
fn tablet_wait_parks_in_hold() {
    let mut sim = SimVehicle::new();
    sim.boot();
    assert_eq!(sim.commander.internal_state().main_state, MainState::AutoLoiter);
}

/// DO_SET_MODE POSCTL without a position estimate falls back to ALTCTL.
#[test]
fn posctl_fallback_to_altctl() {
    let mut sim = SimVehicle::new();
    sim.sensors.gps_ok = false;
    sim.sensors.rc_valid = true;
    sim.boot();

    sim.set_mode_command(CUSTOM_MAIN_MODE_POSCTL, 0);
    sim.run_ms(50);
    assert_eq!(sim.commander.internal_state().main_state, MainState::Altctl);
    let acks = sim.drain_acks();
    assert_eq!(acks.last().unwrap().result, CommandResult::Accepted);
}
