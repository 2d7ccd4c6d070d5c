//! Console front-end for the simulated vehicle.
//!
//! Usage:
//!   cargo run -p strato_sitl --bin strato -- <command> [args]
//!
//! Commands mirror the supervisory CLI: check, arm [-f], disarm [-f],
//! takeoff, land, mode <name>, lockdown on|off, calibrate <type>, pair,
//! set_ekf_origin <lat> <lon> <alt>, fencefile <path>, fake_traffic,
//! poweroff, start [seconds].
//!
//! Exit code 0 on success, 1 on argument error or rejected operation.

use std::path::Path;
use std::process::ExitCode;

use strato_core::status::command_ids;
use strato_core::status::{
    ActionRequestAction, ActionRequestSource, CommandResult, TransponderReport, VehicleCommand,
};
use strato_core::traits::TimeSource;
use strato_sitl::{SimVehicle, SimpleFence};

const CUSTOM_MAIN_MODE_MANUAL: u8 = 1;
const CUSTOM_MAIN_MODE_ALTCTL: u8 = 2;
const CUSTOM_MAIN_MODE_POSCTL: u8 = 3;
const CUSTOM_MAIN_MODE_AUTO: u8 = 4;
const CUSTOM_MAIN_MODE_ACRO: u8 = 5;
const CUSTOM_MAIN_MODE_OFFBOARD: u8 = 6;
const CUSTOM_MAIN_MODE_STABILIZED: u8 = 7;
const CUSTOM_SUB_MODE_AUTO_TAKEOFF: u8 = 2;
const CUSTOM_SUB_MODE_AUTO_LOITER: u8 = 3;
const CUSTOM_SUB_MODE_AUTO_MISSION: u8 = 4;
const CUSTOM_SUB_MODE_AUTO_RTL: u8 = 5;
const CUSTOM_SUB_MODE_AUTO_LAND: u8 = 6;
const CUSTOM_SUB_MODE_AUTO_PRECLAND: u8 = 9;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return ExitCode::from(1);
    };

    let mut sim = SimVehicle::new();
    sim.boot();
    sim.set_home_command();
    sim.run_ms(50);

    let ok = match command.as_str() {
        "start" => {
            let seconds: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(5);
            run_and_report(&mut sim, seconds)
        }
        "check" => {
            let mut cmd = VehicleCommand::internal(command_ids::RUN_PREARM_CHECKS);
            cmd.param1 = 0.0;
            send_and_wait(&mut sim, cmd) && {
                let pass = sim.commander.status_flags().pre_flight_checks_pass;
                println!("preflight checks: {}", if pass { "PASS" } else { "FAIL" });
                pass
            }
        }
        "arm" => {
            sim.arm_command(args.iter().any(|a| a == "-f"));
            sim.run_ms(50);
            report_last_ack(&mut sim) && sim.commander.is_armed()
        }
        "disarm" => {
            sim.disarm_command(args.iter().any(|a| a == "-f"));
            sim.run_ms(50);
            report_last_ack(&mut sim) && !sim.commander.is_armed()
        }
        "takeoff" => {
            sim.set_mode_command(CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_TAKEOFF);
            sim.run_ms(50);
            sim.arm_command(false);
            sim.run_ms(4_000);
            println!(
                "altitude: {:.1} m AGL, mode {:?}",
                sim.model.alt - strato_sitl::sim::GROUND_ALT,
                sim.commander.status().nav_state
            );
            sim.commander.is_armed()
        }
        "land" => {
            sim.set_mode_command(CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_LAND);
            sim.run_ms(50);
            report_last_ack(&mut sim)
        }
        "transition" => {
            let cmd = VehicleCommand::internal(command_ids::DO_VTOL_TRANSITION);
            sim.send_command(cmd);
            sim.run_ms(50);
            println!("transition requested");
            true
        }
        "mode" => match args.get(1).map(String::as_str) {
            Some(name) => match mode_args(name) {
                Some((main, sub)) => {
                    sim.set_mode_command(main, sub);
                    sim.run_ms(50);
                    report_last_ack(&mut sim)
                }
                None => {
                    eprintln!("unknown mode: {name}");
                    false
                }
            },
            None => {
                eprintln!("mode requires an argument");
                false
            }
        },
        "pair" => {
            let cmd = VehicleCommand::internal(command_ids::START_RX_PAIR);
            send_and_wait(&mut sim, cmd)
        }
        "lockdown" => match args.get(1).map(String::as_str) {
            Some("on") => {
                let mut cmd = VehicleCommand::internal(command_ids::DO_FLIGHTTERMINATION);
                cmd.param1 = 2.0;
                send_and_wait(&mut sim, cmd)
            }
            Some("off") => {
                let mut cmd = VehicleCommand::internal(command_ids::DO_FLIGHTTERMINATION);
                cmd.param1 = 0.0;
                send_and_wait(&mut sim, cmd)
            }
            _ => {
                eprintln!("lockdown requires on|off");
                false
            }
        },
        "calibrate" => match args.get(1) {
            Some(kind)
                if matches!(
                    kind.as_str(),
                    "gyro" | "mag" | "baro" | "accel" | "level" | "airspeed" | "esc"
                ) =>
            {
                let mut cmd = VehicleCommand::internal(command_ids::PREFLIGHT_CALIBRATION);
                if kind == "esc" {
                    cmd.param7 = 1.0;
                }
                sim.send_command(cmd);
                sim.run_ms(50);
                // worker completes immediately in the simulation
                sim.commander.worker.finish(0);
                sim.run_ms(50);
                report_last_ack(&mut sim)
            }
            _ => {
                eprintln!("calibrate requires gyro|mag|baro|accel|level|airspeed|esc");
                false
            }
        },
        "set_ekf_origin" => {
            let coords: Option<(f64, f64, f32)> = (|| {
                Some((
                    args.get(1)?.parse().ok()?,
                    args.get(2)?.parse().ok()?,
                    args.get(3)?.parse().ok()?,
                ))
            })();
            match coords {
                Some((lat, lon, _alt)) => {
                    let mut cmd = VehicleCommand::internal(command_ids::SET_GPS_GLOBAL_ORIGIN);
                    cmd.param5 = lat;
                    cmd.param6 = lon;
                    send_and_wait(&mut sim, cmd)
                }
                None => {
                    eprintln!("set_ekf_origin requires lat lon alt");
                    false
                }
            }
        }
        "fencefile" => match args.get(1) {
            Some(path) => match SimpleFence::load_from_file(Path::new(path)) {
                Ok(fence) => {
                    println!("loaded {} fence shape(s)", fence.shape_count());
                    true
                }
                Err(e) => {
                    eprintln!("fence load failed: {e}");
                    false
                }
            },
            None => {
                eprintln!("fencefile requires a path");
                false
            }
        },
        "fake_traffic" => {
            let mut report = TransponderReport::default();
            report.icao_address = 0xCAFE;
            report.lat = sim.model.lat + 0.001;
            report.lon = sim.model.lon;
            report.altitude = sim.model.alt;
            report.timestamp = sim.clock.now_us();
            sim.topics.transponder_report.publish(report);
            sim.run_ms(100);
            for event in sim.drain_events() {
                println!("[{:?}] {}", event.severity, event.message);
            }
            true
        }
        "poweroff" => {
            sim.press_power_button();
            sim.run_ms(50);
            if sim.commander.should_exit() {
                println!("powering off");
                true
            } else {
                eprintln!("shutdown denied");
                false
            }
        }
        "kill" => {
            sim.send_action(ActionRequestSource::RcSwitch, ActionRequestAction::Kill, None);
            sim.run_ms(50);
            true
        }
        _ => {
            print_usage();
            false
        }
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn mode_args(name: &str) -> Option<(u8, u8)> {
    Some(match name {
        "manual" => (CUSTOM_MAIN_MODE_MANUAL, 0),
        "acro" => (CUSTOM_MAIN_MODE_ACRO, 0),
        "offboard" => (CUSTOM_MAIN_MODE_OFFBOARD, 0),
        "stabilized" => (CUSTOM_MAIN_MODE_STABILIZED, 0),
        "altctl" => (CUSTOM_MAIN_MODE_ALTCTL, 0),
        "posctl" => (CUSTOM_MAIN_MODE_POSCTL, 0),
        "auto:mission" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_MISSION),
        "auto:loiter" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_LOITER),
        "auto:rtl" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_RTL),
        "auto:takeoff" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_TAKEOFF),
        "auto:land" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_LAND),
        "auto:precland" => (CUSTOM_MAIN_MODE_AUTO, CUSTOM_SUB_MODE_AUTO_PRECLAND),
        _ => return None,
    })
}

fn send_and_wait(sim: &mut SimVehicle, cmd: VehicleCommand) -> bool {
    sim.send_command(cmd);
    sim.run_ms(50);
    report_last_ack(sim)
}

fn report_last_ack(sim: &mut SimVehicle) -> bool {
    match sim.drain_acks().last() {
        Some(ack) => {
            println!("command {}: {:?}", ack.command, ack.result);
            ack.result == CommandResult::Accepted
        }
        None => {
            eprintln!("no acknowledgement received");
            false
        }
    }
}

fn run_and_report(sim: &mut SimVehicle, seconds: u64) -> bool {
    for _ in 0..seconds {
        sim.run_ms(1_000);
        let status = sim.commander.status();
        println!(
            "t={:>4}s arming={:?} nav={:?} alt={:.1}m failsafe={}",
            sim.clock.now_us() / 1_000_000,
            status.arming_state,
            status.nav_state,
            sim.model.alt,
            status.failsafe,
        );
        for event in sim.drain_events() {
            println!("  [{:?}] {}", event.severity, event.message);
        }
    }
    true
}

fn print_usage() {
    eprintln!(
        "usage: strato <command>\n\
         commands:\n\
         \x20 start [seconds]          run the simulation and print status\n\
         \x20 check                    run preflight checks\n\
         \x20 arm [-f] | disarm [-f]   arm/disarm (force with -f)\n\
         \x20 takeoff | land           simple flight actions\n\
         \x20 transition               VTOL transition\n\
         \x20 mode <name>              manual|acro|offboard|stabilized|altctl|posctl|auto:*\n\
         \x20 pair                     RC receiver pairing\n\
         \x20 lockdown on|off          motor lockdown\n\
         \x20 calibrate <type>         gyro|mag|baro|accel|level|airspeed|esc\n\
         \x20 set_ekf_origin lat lon alt\n\
         \x20 fencefile <path>         validate a fence file\n\
         \x20 fake_traffic             inject a transponder report\n\
         \x20 poweroff                 request shutdown"
    );
}
