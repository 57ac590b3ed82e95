//! Controller configuration.
//!
//! Loaded once at startup from a JSON file. Every per-device setting is an
//! array indexed by device position (the position in the filtered device
//! list, not the hardware index). Arrays may be shorter than the number of
//! controlled devices; positions past the end fall back to the first entry.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on `proportional_gain`: 100 steps per °C already drives any
/// device across its whole voltage range in one tick.
pub const MAX_PROPORTIONAL_GAIN: f64 = 100.0;

/// A per-device setting with index-0 fallback.
///
/// Never empty: deserialization and [`TryFrom`] reject an empty array, so
/// [`get`](Self::get) always has a value to fall back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct PerDevice<T: Clone>(Vec<T>);

impl<T: Copy> PerDevice<T> {
    /// One value shared by every device.
    pub fn uniform(value: T) -> Self {
        Self(vec![value])
    }

    /// Value for `position`, or the first entry when the array is shorter.
    pub fn get(&self, position: usize) -> T {
        self.0.get(position).copied().unwrap_or(self.0[0])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Clone> TryFrom<Vec<T>> for PerDevice<T> {
    type Error = String;

    fn try_from(values: Vec<T>) -> std::result::Result<Self, Self::Error> {
        if values.is_empty() {
            return Err("per-device array must have at least one entry".into());
        }
        Ok(Self(values))
    }
}

impl<T: Clone> From<PerDevice<T>> for Vec<T> {
    fn from(values: PerDevice<T>) -> Self {
        values.0
    }
}

/// Settings for a single device position, with fallback already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub min_voltage_uv: i64,
    pub max_voltage_uv: i64,
    pub start_voltage_uv: i64,
    pub target_temperature_c: i32,
    /// Hard ceiling; reaching it restarts the host.
    pub max_temperature_c: i32,
    /// Floor; at or below it the device is assumed hung and the host restarts.
    pub min_power_draw_w: i32,
    pub max_power_draw_w: i32,
    /// Preferred draw. Only reported, the controller does not regulate on it.
    pub target_power_draw_w: i32,
    pub base_clock_offset_mhz: i32,
    pub memory_clock_offset_mhz: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Device positions to control. Empty means every device.
    pub devices: Vec<usize>,

    /// Granularity accepted by the hardware for voltage commands (µV).
    pub voltage_step_uv: i64,

    /// Voltage steps per °C of temperature error.
    pub proportional_gain: f64,

    pub tick_interval_ms: u64,

    /// Settle period before clock offsets are applied.
    pub tuning_delay_ms: u64,

    pub min_voltage_uv: PerDevice<i64>,
    pub max_voltage_uv: PerDevice<i64>,
    pub start_voltage_uv: PerDevice<i64>,
    pub target_temperature_c: PerDevice<i32>,
    pub max_temperature_c: PerDevice<i32>,
    pub min_power_draw_w: PerDevice<i32>,
    pub max_power_draw_w: PerDevice<i32>,
    pub target_power_draw_w: PerDevice<i32>,
    pub base_clock_offset_mhz: PerDevice<i32>,
    pub memory_clock_offset_mhz: PerDevice<i32>,

    /// Telemetry tool invoked as `<cmd> --query-gpu=index,<field> --format=csv,noheader`.
    pub telemetry_command: String,

    /// Actuation tool invoked with one argument per directive.
    pub actuator_command: String,

    /// Full argv of the host restart command.
    pub restart_command: Vec<String>,

    /// Log actuation and restart instead of touching the hardware.
    pub dry_run: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            devices: (0..7).collect(),
            voltage_step_uv: 6250,
            proportional_gain: 0.3,
            tick_interval_ms: 2_000,
            tuning_delay_ms: 10 * 60 * 1_000,
            min_voltage_uv: PerDevice(vec![
                762_000, 743_000, 762_000, 750_000, 750_000, 775_000, 762_000,
            ]),
            max_voltage_uv: PerDevice(vec![
                880_000, 850_000, 875_000, 875_000, 875_000, 875_000, 875_000,
            ]),
            start_voltage_uv: PerDevice::uniform(850_000),
            target_temperature_c: PerDevice::uniform(63),
            max_temperature_c: PerDevice::uniform(80),
            min_power_draw_w: PerDevice::uniform(150),
            max_power_draw_w: PerDevice::uniform(300),
            target_power_draw_w: PerDevice::uniform(280),
            base_clock_offset_mhz: PerDevice(vec![170, 170, 130, 140, 170, 180, 130]),
            memory_clock_offset_mhz: PerDevice(vec![220, 460, 460, 460, 300, 460, 450]),
            telemetry_command: "nvidia-smi".into(),
            actuator_command: "nvidiaInspector".into(),
            restart_command: vec!["shutdown".into(), "/r".into()],
            dry_run: false,
        }
    }
}

impl ControllerConfig {
    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve every per-device setting for `position`.
    pub fn device(&self, position: usize) -> DeviceConfig {
        DeviceConfig {
            min_voltage_uv: self.min_voltage_uv.get(position),
            max_voltage_uv: self.max_voltage_uv.get(position),
            start_voltage_uv: self.start_voltage_uv.get(position),
            target_temperature_c: self.target_temperature_c.get(position),
            max_temperature_c: self.max_temperature_c.get(position),
            min_power_draw_w: self.min_power_draw_w.get(position),
            max_power_draw_w: self.max_power_draw_w.get(position),
            target_power_draw_w: self.target_power_draw_w.get(position),
            base_clock_offset_mhz: self.base_clock_offset_mhz.get(position),
            memory_clock_offset_mhz: self.memory_clock_offset_mhz.get(position),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn tuning_delay(&self) -> Duration {
        Duration::from_millis(self.tuning_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.voltage_step_uv <= 0 {
            return Err(Error::Config(format!(
                "voltage_step_uv must be positive, got {}",
                self.voltage_step_uv
            )));
        }
        if !(self.proportional_gain > 0.0 && self.proportional_gain <= MAX_PROPORTIONAL_GAIN) {
            return Err(Error::Config(format!(
                "proportional_gain must be in (0, {MAX_PROPORTIONAL_GAIN}], got {}",
                self.proportional_gain
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".into()));
        }
        if self.telemetry_command.is_empty() || self.actuator_command.is_empty() {
            return Err(Error::Config("gateway commands must not be empty".into()));
        }
        if self.restart_command.is_empty() {
            return Err(Error::Config("restart_command must not be empty".into()));
        }

        let configured = [
            self.min_voltage_uv.len(),
            self.max_voltage_uv.len(),
            self.start_voltage_uv.len(),
            self.min_power_draw_w.len(),
            self.max_power_draw_w.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        for position in 0..configured {
            let device = self.device(position);
            if !(device.min_voltage_uv <= device.start_voltage_uv
                && device.start_voltage_uv <= device.max_voltage_uv)
            {
                return Err(Error::Config(format!(
                    "position {position}: expected min <= start <= max voltage, got {} / {} / {} uV",
                    device.min_voltage_uv, device.start_voltage_uv, device.max_voltage_uv
                )));
            }
            let highest_step = device.max_voltage_uv.div_euclid(self.voltage_step_uv)
                * self.voltage_step_uv;
            if highest_step < device.min_voltage_uv {
                return Err(Error::Config(format!(
                    "position {position}: no {} uV step between {} and {} uV",
                    self.voltage_step_uv, device.min_voltage_uv, device.max_voltage_uv
                )));
            }
            if device.min_power_draw_w >= device.max_power_draw_w {
                return Err(Error::Config(format!(
                    "position {position}: min power draw {} W must be below max {} W",
                    device.min_power_draw_w, device.max_power_draw_w
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fall_back_to_first_entry_past_end() {
        let target = PerDevice::uniform(63);

        assert_eq!(target.get(0), 63);
        assert_eq!(target.get(1), 63);
        assert_eq!(target.get(2), 63);
    }

    #[test]
    fn should_use_own_entry_when_present() {
        let offsets: PerDevice<i32> = vec![170, 130].try_into().unwrap();

        assert_eq!(offsets.get(0), 170);
        assert_eq!(offsets.get(1), 130);
        assert_eq!(offsets.get(5), 170);
    }

    #[test]
    fn should_reject_empty_per_device_array() {
        let result = PerDevice::<i32>::try_from(Vec::new());
        assert!(result.is_err());

        let json = r#"{ "max_temperature_c": [] }"#;
        assert!(matches!(
            ControllerConfig::from_json_str(json),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn default_config_is_valid() {
        ControllerConfig::default().validate().unwrap();
    }

    #[test]
    fn should_fill_missing_fields_from_defaults() {
        let json = r#"{ "devices": [1, 3], "target_temperature_c": [60] }"#;

        let config = ControllerConfig::from_json_str(json).unwrap();

        assert_eq!(config.devices, vec![1, 3]);
        assert_eq!(config.device(4).target_temperature_c, 60);
        assert_eq!(config.voltage_step_uv, 6250);
        assert_eq!(config.tick_interval(), Duration::from_secs(2));
        assert_eq!(config.tuning_delay(), Duration::from_secs(600));
    }

    #[test]
    fn should_resolve_device_with_fallback() {
        let config = ControllerConfig::default();

        let device = config.device(1);
        assert_eq!(device.min_voltage_uv, 743_000);
        assert_eq!(device.max_voltage_uv, 850_000);
        assert_eq!(device.memory_clock_offset_mhz, 460);

        let beyond = config.device(10);
        assert_eq!(beyond.min_voltage_uv, 762_000);
        assert_eq!(beyond.base_clock_offset_mhz, 170);
    }

    #[test]
    fn should_reject_start_voltage_outside_bounds() {
        let json = r#"{
            "min_voltage_uv": [800000],
            "max_voltage_uv": [900000],
            "start_voltage_uv": [900000, 950000]
        }"#;

        let err = ControllerConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("position 1")));
    }

    #[test]
    fn should_reject_non_positive_voltage_step() {
        let json = r#"{ "voltage_step_uv": 0 }"#;

        assert!(matches!(
            ControllerConfig::from_json_str(json),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn should_reject_proportional_gain_out_of_range() {
        for gain in ["1e15", "0.0", "-0.3"] {
            let json = format!(r#"{{ "proportional_gain": {gain} }}"#);

            let err = ControllerConfig::from_json_str(&json).unwrap_err();
            assert!(
                matches!(err, Error::Config(ref msg) if msg.contains("proportional_gain")),
                "gain {gain}: {err}"
            );
        }

        let json = r#"{ "proportional_gain": 100.0 }"#;
        assert!(ControllerConfig::from_json_str(json).is_ok());
    }

    #[test]
    fn should_reject_bounds_without_a_voltage_step() {
        let json = r#"{
            "min_voltage_uv": [851000],
            "max_voltage_uv": [855000],
            "start_voltage_uv": [852000]
        }"#;

        let err = ControllerConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("no 6250 uV step")));
    }

    #[test]
    fn should_reject_inverted_power_limits() {
        let json = r#"{ "min_power_draw_w": [300], "max_power_draw_w": [150] }"#;

        assert!(matches!(
            ControllerConfig::from_json_str(json),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn should_reject_unknown_fields() {
        let json = r#"{ "voltage_stepp": 6250 }"#;

        assert!(ControllerConfig::from_json_str(json).is_err());
    }
}
