//! Parameter store.
//!
//! Bounded key/value map with per-parameter flags. Persistence and the
//! GCS parameter protocol live outside the core; the store exposes a dirty
//! flag for the backend and a notification counter for subscribers.

use super::error::ParameterError;
use bitflags::bitflags;
use heapless::index_map::FnvIndexMap;
use heapless::String;

/// Maximum parameter name length.
pub const PARAM_NAME_LEN: usize = 16;

/// Maximum number of parameters.
pub const MAX_PARAMS: usize = 128;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        /// Cannot be modified through the command interface.
        const READ_ONLY = 1 << 0;
        /// Written by the core itself (e.g. flight counter).
        const SYSTEM = 1 << 1;
    }
}

/// Parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl ParamValue {
    /// Read as integer, converting floats and bools.
    pub fn as_int(&self) -> i32 {
        match self {
            ParamValue::Int(v) => *v,
            ParamValue::Float(v) => *v as i32,
            ParamValue::Bool(v) => *v as i32,
        }
    }

    /// Read as float, converting integers and bools.
    pub fn as_float(&self) -> f32 {
        match self {
            ParamValue::Int(v) => *v as f32,
            ParamValue::Float(v) => *v,
            ParamValue::Bool(v) => (*v as i32) as f32,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ParamValue::Int(v) => *v != 0,
            ParamValue::Float(v) => *v != 0.0,
            ParamValue::Bool(v) => *v,
        }
    }
}

type Key = String<PARAM_NAME_LEN>;

/// Bounded parameter store.
pub struct ParameterStore {
    parameters: FnvIndexMap<Key, ParamValue, MAX_PARAMS>,
    flags: FnvIndexMap<Key, ParamFlags, MAX_PARAMS>,
    dirty: bool,
    notify_count: u32,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            parameters: FnvIndexMap::new(),
            flags: FnvIndexMap::new(),
            dirty: false,
            notify_count: 0,
        }
    }

    fn key(name: &str) -> Result<Key, ParameterError> {
        let mut key = Key::new();
        key.push_str(name)
            .map_err(|_| ParameterError::UnknownParameter)?;
        Ok(key)
    }

    /// Register a parameter with its default. Idempotent.
    pub fn register(
        &mut self,
        name: &str,
        default_value: ParamValue,
        flags: ParamFlags,
    ) -> Result<(), ParameterError> {
        let key = Self::key(name)?;
        if self.parameters.contains_key(&key) {
            return Ok(());
        }
        let _ = self
            .parameters
            .insert(key.clone(), default_value)
            .map_err(|_| ParameterError::StoreFull)?;
        let _ = self
            .flags
            .insert(key, flags)
            .map_err(|_| ParameterError::StoreFull)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let key = Self::key(name).ok()?;
        self.parameters.get(&key)
    }

    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        self.get(name).map(|v| v.as_float()).unwrap_or(default)
    }

    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        self.get(name).map(|v| v.as_int()).unwrap_or(default)
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(|v| v.as_bool()).unwrap_or(default)
    }

    /// Set a parameter and bump the notification counter.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        self.write(name, value, true)
    }

    /// Set a parameter without notifying subscribers.
    ///
    /// Used for the flight counter, which changes on every landing and
    /// must not trigger a parameter re-read.
    pub fn set_no_notification(
        &mut self,
        name: &str,
        value: ParamValue,
    ) -> Result<(), ParameterError> {
        self.write(name, value, false)
    }

    fn write(
        &mut self,
        name: &str,
        value: ParamValue,
        notify: bool,
    ) -> Result<(), ParameterError> {
        let key = Self::key(name)?;
        let current = self
            .parameters
            .get(&key)
            .ok_or(ParameterError::UnknownParameter)?;

        if core::mem::discriminant(current) != core::mem::discriminant(&value) {
            return Err(ParameterError::TypeMismatch);
        }
        if let Some(flags) = self.flags.get(&key) {
            if flags.contains(ParamFlags::READ_ONLY) {
                return Err(ParameterError::ReadOnly);
            }
        }

        self.parameters.insert(key, value).ok();
        self.dirty = true;
        if notify {
            self.notify_count += 1;
        }
        Ok(())
    }

    /// True if the backend should persist the store.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Counter incremented by every notifying write.
    pub fn notify_count(&self) -> u32 {
        self.notify_count
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut store = ParameterStore::new();
        store
            .register("COM_DL_LOSS_T", ParamValue::Float(10.0), ParamFlags::empty())
            .unwrap();
        store.set("COM_DL_LOSS_T", ParamValue::Float(25.0)).unwrap();

        // re-register must not overwrite the stored value
        store
            .register("COM_DL_LOSS_T", ParamValue::Float(10.0), ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get_float("COM_DL_LOSS_T", 0.0), 25.0);
    }

    #[test]
    fn unknown_parameter_rejected() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.set("NOT_THERE", ParamValue::Int(1)),
            Err(ParameterError::UnknownParameter)
        );
        assert!(store.get("NOT_THERE").is_none());
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut store = ParameterStore::new();
        store
            .register("NAV_RCL_ACT", ParamValue::Int(2), ParamFlags::empty())
            .unwrap();
        assert_eq!(
            store.set("NAV_RCL_ACT", ParamValue::Float(2.0)),
            Err(ParameterError::TypeMismatch)
        );
    }

    #[test]
    fn read_only_rejected() {
        let mut store = ParameterStore::new();
        store
            .register("MAV_SYS_ID", ParamValue::Int(1), ParamFlags::READ_ONLY)
            .unwrap();
        assert_eq!(
            store.set("MAV_SYS_ID", ParamValue::Int(3)),
            Err(ParameterError::ReadOnly)
        );
    }

    #[test]
    fn notification_counter() {
        let mut store = ParameterStore::new();
        store
            .register("COM_FLIGHT_UUID", ParamValue::Int(0), ParamFlags::SYSTEM)
            .unwrap();

        assert_eq!(store.notify_count(), 0);
        store.set("COM_FLIGHT_UUID", ParamValue::Int(1)).unwrap();
        assert_eq!(store.notify_count(), 1);

        store
            .set_no_notification("COM_FLIGHT_UUID", ParamValue::Int(2))
            .unwrap();
        assert_eq!(store.notify_count(), 1);
        assert!(store.is_dirty());
        assert_eq!(store.get_int("COM_FLIGHT_UUID", 0), 2);
    }

    #[test]
    fn typed_accessors_convert() {
        let mut store = ParameterStore::new();
        store
            .register("COM_DISARM_LAND", ParamValue::Float(2.0), ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get_int("COM_DISARM_LAND", 0), 2);
        assert!(store.get_bool("COM_DISARM_LAND", false));
        assert_eq!(store.get_float("MISSING", 7.5), 7.5);
    }
}
