//! Typed parameter blocks.
//!
//! Each supervisory task registers its defaults once at boot and loads a
//! typed snapshot with `from_store`. Names follow the conventional autopilot
//! parameter dictionary so a ground station can edit them unchanged.

use super::storage::{ParamFlags, ParamValue, ParameterStore};
use crate::failsafe::{
    ActuatorFailureAction, ImbalancedPropAction, LinkLossAction, LowBatteryAction,
    OffboardLossAction, OffboardLossRcAction, QuadchuteAction, RclExceptMask,
};
use crate::geofence::GeofenceAction;

/// Commander parameter snapshot.
#[derive(Debug, Clone)]
pub struct CommanderParams {
    pub mav_sys_id: u8,
    pub mav_comp_id: u8,
    /// Home position handling enabled.
    pub com_home_en: bool,
    /// Refresh home while in air.
    pub com_home_in_air: bool,
    /// Auto-disarm after landing, seconds (0 disables).
    pub com_disarm_land: f32,
    /// Auto-disarm when never taken off, seconds (0 disables).
    pub com_disarm_preflight: f32,
    /// Kill-switch confirmed disarm delay, seconds.
    pub com_kill_disarm: f32,
    /// ESC spool-up window after arming, seconds.
    pub com_spoolup_time: f32,
    /// Lockdown window after takeoff for critical failures, seconds.
    pub com_lkdown_tko: f32,
    /// GCS heartbeat loss timeout, seconds.
    pub com_dl_loss_t: f32,
    /// High-latency link loss timeout, seconds.
    pub com_hldl_loss_t: f32,
    /// High-latency link regain timeout, seconds.
    pub com_hldl_reg_t: f32,
    /// Onboard controller heartbeat timeout, seconds.
    pub com_obc_loss_t: f32,
    /// Stick input timeout before RC loss, seconds.
    pub com_rc_loss_t: f32,
    /// Action on GCS link loss.
    pub nav_dll_act: LinkLossAction,
    /// Action on RC loss.
    pub nav_rcl_act: LinkLossAction,
    /// Modes exempt from the RC-loss action.
    pub com_rcl_except: RclExceptMask,
    /// Action on battery warning escalation.
    pub com_low_bat_act: LowBatteryAction,
    /// Delay before the battery action engages, seconds.
    pub com_bat_act_t: f32,
    /// Offboard signal availability hysteresis, seconds.
    pub com_of_loss_t: f32,
    /// Action on offboard loss without RC.
    pub com_obl_act: OffboardLossAction,
    /// Action on offboard loss with RC available.
    pub com_obl_rc_act: OffboardLossRcAction,
    /// VTOL quadchute action.
    pub com_qc_act: QuadchuteAction,
    /// Imbalanced propeller action.
    pub com_imb_prop_act: ImbalancedPropAction,
    /// Motor/actuator failure action.
    pub com_act_fail_act: ActuatorFailureAction,
    /// Maximum flight time, seconds (<= 0 disables).
    pub com_flt_time_max: f32,
    /// Wind warning threshold, m/s (<= 0 disables).
    pub com_wind_warn: f32,
    /// Wind RTL threshold, m/s (<= 0 disables).
    pub com_wind_max: f32,
    /// Stick-takeover enable bits (bit 0 auto, bit 1 offboard).
    pub com_rc_override: i32,
    /// Prearm mode: 0 disabled, 1 safety switch, 2 always.
    pub com_prearm_mode: i32,
    /// Flight counter, incremented on every disarm.
    pub com_flight_uuid: i32,
    /// Flight termination circuit breaker (121212 disables termination).
    pub cbrk_flightterm: i32,
}

/// Circuit breaker engage value for CBRK_FLIGHTTERM.
pub const CBRK_FLIGHTTERM_KEY: i32 = 121212;

impl CommanderParams {
    pub fn register_defaults(store: &mut ParameterStore) {
        let defs: &[(&str, ParamValue)] = &[
            ("MAV_SYS_ID", ParamValue::Int(1)),
            ("MAV_COMP_ID", ParamValue::Int(1)),
            ("COM_HOME_EN", ParamValue::Bool(true)),
            ("COM_HOME_IN_AIR", ParamValue::Bool(false)),
            ("COM_DISARM_LAND", ParamValue::Float(2.0)),
            ("COM_DISARM_PRFLT", ParamValue::Float(10.0)),
            ("COM_KILL_DISARM", ParamValue::Float(5.0)),
            ("COM_SPOOLUP_TIME", ParamValue::Float(1.0)),
            ("COM_LKDOWN_TKO", ParamValue::Float(3.0)),
            ("COM_DL_LOSS_T", ParamValue::Float(10.0)),
            ("COM_HLDL_LOSS_T", ParamValue::Float(120.0)),
            ("COM_HLDL_REG_T", ParamValue::Float(0.0)),
            ("COM_OBC_LOSS_T", ParamValue::Float(5.0)),
            ("COM_RC_LOSS_T", ParamValue::Float(0.5)),
            ("NAV_DLL_ACT", ParamValue::Int(0)),
            ("NAV_RCL_ACT", ParamValue::Int(2)),
            ("COM_RCL_EXCEPT", ParamValue::Int(0)),
            ("COM_LOW_BAT_ACT", ParamValue::Int(0)),
            ("COM_BAT_ACT_T", ParamValue::Float(5.0)),
            ("COM_OF_LOSS_T", ParamValue::Float(1.0)),
            ("COM_OBL_ACT", ParamValue::Int(0)),
            ("COM_OBL_RC_ACT", ParamValue::Int(0)),
            ("COM_QC_ACT", ParamValue::Int(0)),
            ("COM_IMB_PROP_ACT", ParamValue::Int(0)),
            ("COM_ACT_FAIL_ACT", ParamValue::Int(0)),
            ("COM_FLT_TIME_MAX", ParamValue::Float(-1.0)),
            ("COM_WIND_WARN", ParamValue::Float(-1.0)),
            ("COM_WIND_MAX", ParamValue::Float(-1.0)),
            ("COM_RC_OVERRIDE", ParamValue::Int(1)),
            ("COM_PREARM_MODE", ParamValue::Int(0)),
            ("CBRK_FLIGHTTERM", ParamValue::Int(CBRK_FLIGHTTERM_KEY)),
        ];
        for (name, value) in defs {
            let _ = store.register(name, *value, ParamFlags::empty());
        }
        let _ = store.register("COM_FLIGHT_UUID", ParamValue::Int(0), ParamFlags::SYSTEM);
    }

    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            mav_sys_id: store.get_int("MAV_SYS_ID", 1) as u8,
            mav_comp_id: store.get_int("MAV_COMP_ID", 1) as u8,
            com_home_en: store.get_bool("COM_HOME_EN", true),
            com_home_in_air: store.get_bool("COM_HOME_IN_AIR", false),
            com_disarm_land: store.get_float("COM_DISARM_LAND", 2.0),
            com_disarm_preflight: store.get_float("COM_DISARM_PRFLT", 10.0),
            com_kill_disarm: store.get_float("COM_KILL_DISARM", 5.0),
            com_spoolup_time: store.get_float("COM_SPOOLUP_TIME", 1.0),
            com_lkdown_tko: store.get_float("COM_LKDOWN_TKO", 3.0),
            com_dl_loss_t: store.get_float("COM_DL_LOSS_T", 10.0),
            com_hldl_loss_t: store.get_float("COM_HLDL_LOSS_T", 120.0),
            com_hldl_reg_t: store.get_float("COM_HLDL_REG_T", 0.0),
            com_obc_loss_t: store.get_float("COM_OBC_LOSS_T", 5.0),
            com_rc_loss_t: store.get_float("COM_RC_LOSS_T", 0.5),
            nav_dll_act: LinkLossAction::from_i32(store.get_int("NAV_DLL_ACT", 0)),
            nav_rcl_act: LinkLossAction::from_i32(store.get_int("NAV_RCL_ACT", 2)),
            com_rcl_except: RclExceptMask::from_bits_truncate(
                store.get_int("COM_RCL_EXCEPT", 0) as u8
            ),
            com_low_bat_act: LowBatteryAction::from_i32(store.get_int("COM_LOW_BAT_ACT", 0)),
            com_bat_act_t: store.get_float("COM_BAT_ACT_T", 5.0),
            com_of_loss_t: store.get_float("COM_OF_LOSS_T", 1.0),
            com_obl_act: OffboardLossAction::from_i32(store.get_int("COM_OBL_ACT", 0)),
            com_obl_rc_act: OffboardLossRcAction::from_i32(store.get_int("COM_OBL_RC_ACT", 0)),
            com_qc_act: QuadchuteAction::from_i32(store.get_int("COM_QC_ACT", 0)),
            com_imb_prop_act: ImbalancedPropAction::from_i32(store.get_int("COM_IMB_PROP_ACT", 0)),
            com_act_fail_act: ActuatorFailureAction::from_i32(store.get_int("COM_ACT_FAIL_ACT", 0)),
            com_flt_time_max: store.get_float("COM_FLT_TIME_MAX", -1.0),
            com_wind_warn: store.get_float("COM_WIND_WARN", -1.0),
            com_wind_max: store.get_float("COM_WIND_MAX", -1.0),
            com_rc_override: store.get_int("COM_RC_OVERRIDE", 1),
            com_prearm_mode: store.get_int("COM_PREARM_MODE", 0),
            com_flight_uuid: store.get_int("COM_FLIGHT_UUID", 0),
            cbrk_flightterm: store.get_int("CBRK_FLIGHTTERM", CBRK_FLIGHTTERM_KEY),
        }
    }

    /// True when the flight-termination safety action is disabled for bench
    /// testing.
    pub fn flight_termination_disabled(&self) -> bool {
        self.cbrk_flightterm == CBRK_FLIGHTTERM_KEY
    }
}

/// Navigator parameter snapshot.
#[derive(Debug, Clone)]
pub struct NavigatorParams {
    /// Default waypoint acceptance radius, meters.
    pub nav_acc_rad: f32,
    /// Default loiter radius (fixed wing), meters.
    pub nav_loiter_rad: f32,
    /// Default takeoff altitude above home, meters.
    pub mis_takeoff_alt: f32,
    /// Return altitude above home, meters.
    pub rtl_return_alt: f32,
    /// Descend/loiter altitude above home at the return point, meters.
    pub rtl_descend_alt: f32,
    /// Loiter delay before the final descent, seconds (< 0 waits forever).
    pub rtl_land_delay: f32,
    /// RTL sub-type: 0 direct, 1 mission landing, 2 mission reversed, 3 closest.
    pub rtl_type: i32,
    /// Geofence action.
    pub gf_action: GeofenceAction,
    /// Maximum horizontal distance from home, meters (0 disables).
    pub gf_max_hor_dist: f32,
    /// Maximum altitude above home, meters (0 disables).
    pub gf_max_ver_dist: f32,
    /// Predict breaches from the braking distance instead of the position.
    pub gf_predict: bool,
    /// Default cruise speed for rotary wing, m/s.
    pub mpc_xy_cruise: f32,
    /// Maximum horizontal acceleration, m/s^2 (braking model).
    pub mpc_acc_hor: f32,
    /// Maximum descent/climb braking deceleration, m/s^2.
    pub mpc_acc_ver: f32,
    /// Traffic avoidance mode: 0 disabled, 1 warn, 2 RTL, 3 land.
    pub nav_traff_avoid: i32,
    /// Traffic conflict horizontal radius, meters.
    pub nav_traff_a_hor: f32,
    /// Traffic conflict vertical radius, meters.
    pub nav_traff_a_ver: f32,
}

impl NavigatorParams {
    pub fn register_defaults(store: &mut ParameterStore) {
        let defs: &[(&str, ParamValue)] = &[
            ("NAV_ACC_RAD", ParamValue::Float(10.0)),
            ("NAV_LOITER_RAD", ParamValue::Float(80.0)),
            ("MIS_TAKEOFF_ALT", ParamValue::Float(2.5)),
            ("RTL_RETURN_ALT", ParamValue::Float(60.0)),
            ("RTL_DESCEND_ALT", ParamValue::Float(30.0)),
            ("RTL_LAND_DELAY", ParamValue::Float(0.0)),
            ("RTL_TYPE", ParamValue::Int(0)),
            ("GF_ACTION", ParamValue::Int(1)),
            ("GF_MAX_HOR_DIST", ParamValue::Float(0.0)),
            ("GF_MAX_VER_DIST", ParamValue::Float(0.0)),
            ("GF_PREDICT", ParamValue::Bool(true)),
            ("MPC_XY_CRUISE", ParamValue::Float(5.0)),
            ("MPC_ACC_HOR", ParamValue::Float(3.0)),
            ("MPC_ACC_VER", ParamValue::Float(4.0)),
            ("NAV_TRAFF_AVOID", ParamValue::Int(1)),
            ("NAV_TRAFF_A_HOR", ParamValue::Float(500.0)),
            ("NAV_TRAFF_A_VER", ParamValue::Float(500.0)),
        ];
        for (name, value) in defs {
            let _ = store.register(name, *value, ParamFlags::empty());
        }
    }

    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            nav_acc_rad: store.get_float("NAV_ACC_RAD", 10.0),
            nav_loiter_rad: store.get_float("NAV_LOITER_RAD", 80.0),
            mis_takeoff_alt: store.get_float("MIS_TAKEOFF_ALT", 2.5),
            rtl_return_alt: store.get_float("RTL_RETURN_ALT", 60.0),
            rtl_descend_alt: store.get_float("RTL_DESCEND_ALT", 30.0),
            rtl_land_delay: store.get_float("RTL_LAND_DELAY", 0.0),
            rtl_type: store.get_int("RTL_TYPE", 0),
            gf_action: GeofenceAction::from_i32(store.get_int("GF_ACTION", 1)),
            gf_max_hor_dist: store.get_float("GF_MAX_HOR_DIST", 0.0),
            gf_max_ver_dist: store.get_float("GF_MAX_VER_DIST", 0.0),
            gf_predict: store.get_bool("GF_PREDICT", true),
            mpc_xy_cruise: store.get_float("MPC_XY_CRUISE", 5.0),
            mpc_acc_hor: store.get_float("MPC_ACC_HOR", 3.0),
            mpc_acc_ver: store.get_float("MPC_ACC_VER", 4.0),
            nav_traff_avoid: store.get_int("NAV_TRAFF_AVOID", 1),
            nav_traff_a_hor: store.get_float("NAV_TRAFF_A_HOR", 500.0),
            nav_traff_a_ver: store.get_float("NAV_TRAFF_A_VER", 500.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commander_defaults_round_trip() {
        let mut store = ParameterStore::new();
        CommanderParams::register_defaults(&mut store);

        let params = CommanderParams::from_store(&store);
        assert_eq!(params.mav_sys_id, 1);
        assert_eq!(params.nav_rcl_act, LinkLossAction::ReturnToLaunch);
        assert_eq!(params.nav_dll_act, LinkLossAction::Disabled);
        assert!((params.com_disarm_land - 2.0).abs() < f32::EPSILON);
        assert!(params.flight_termination_disabled());
    }

    #[test]
    fn commander_params_follow_store_changes() {
        let mut store = ParameterStore::new();
        CommanderParams::register_defaults(&mut store);

        store.set("NAV_DLL_ACT", ParamValue::Int(2)).unwrap();
        store.set("COM_DL_LOSS_T", ParamValue::Float(20.0)).unwrap();
        store.set("CBRK_FLIGHTTERM", ParamValue::Int(0)).unwrap();

        let params = CommanderParams::from_store(&store);
        assert_eq!(params.nav_dll_act, LinkLossAction::ReturnToLaunch);
        assert!((params.com_dl_loss_t - 20.0).abs() < f32::EPSILON);
        assert!(!params.flight_termination_disabled());
    }

    #[test]
    fn navigator_defaults_round_trip() {
        let mut store = ParameterStore::new();
        NavigatorParams::register_defaults(&mut store);

        let params = NavigatorParams::from_store(&store);
        assert_eq!(params.gf_action, GeofenceAction::Warn);
        assert!((params.rtl_return_alt - 60.0).abs() < f32::EPSILON);
        assert!(params.gf_predict);
    }
}
