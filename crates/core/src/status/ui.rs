//! Operator-feedback output records (tunes and LEDs).
//!
//! The core only publishes these; the buzzer and LED drivers are external.

/// Tune identifiers understood by the buzzer driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneId {
    Stop,
    ArmingWarning,
    NotifyPositive,
    NotifyNeutral,
    NotifyNegative,
    BatteryWarningSlow,
    BatteryWarningFast,
    ParachuteRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneControl {
    pub tune: TuneId,
    /// Override an already playing tune.
    pub force: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    Off,
    Red,
    Green,
    Blue,
    Amber,
    Purple,
    White,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedMode {
    Off,
    On,
    BlinkSlow,
    BlinkNormal,
    BlinkFast,
    Breathe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedControl {
    pub color: LedColor,
    pub mode: LedMode,
    pub timestamp: u64,
}
