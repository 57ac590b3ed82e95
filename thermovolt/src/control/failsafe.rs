//! Hard limits that end the control loop by restarting the host.

use std::fmt;

use crate::config::ControllerConfig;
use crate::sample::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailsafeTrip {
    OverTemperature {
        device: u32,
        temperature_c: i32,
        limit_c: i32,
    },
    /// Draw collapsed, usually a hung or crashed device.
    UnderPower {
        device: u32,
        power_draw_w: i32,
        limit_w: i32,
    },
    OverPower {
        device: u32,
        power_draw_w: i32,
        limit_w: i32,
    },
}

impl fmt::Display for FailsafeTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FailsafeTrip::OverTemperature {
                device,
                temperature_c,
                limit_c,
            } => write!(
                f,
                "maximum temperature reached on #{device}: {temperature_c} °C >= {limit_c} °C"
            ),
            FailsafeTrip::UnderPower {
                device,
                power_draw_w,
                limit_w,
            } => write!(
                f,
                "minimum power draw reached on #{device}: {power_draw_w} W <= {limit_w} W"
            ),
            FailsafeTrip::OverPower {
                device,
                power_draw_w,
                limit_w,
            } => write!(
                f,
                "maximum power draw reached on #{device}: {power_draw_w} W >= {limit_w} W"
            ),
        }
    }
}

/// Check per-position temperatures against each device's maximum.
///
/// Runs as soon as temperatures are known, before power draw is queried, so
/// an unreadable power value cannot hold back an over-temperature restart.
pub fn check_temperature(
    temperatures_c: &[i32],
    devices: &[u32],
    config: &ControllerConfig,
) -> Option<FailsafeTrip> {
    temperatures_c
        .iter()
        .zip(devices)
        .enumerate()
        .find_map(|(position, (&temperature_c, &device))| {
            let limit_c = config.max_temperature_c.get(position);
            (temperature_c >= limit_c).then_some(FailsafeTrip::OverTemperature {
                device,
                temperature_c,
                limit_c,
            })
        })
}

/// Check power draw against both limits.
///
/// The minimum runs over all devices before the maximum, so a collapsed
/// device anywhere wins over an overdrawing one.
pub fn check_power(
    sample: &Sample,
    devices: &[u32],
    config: &ControllerConfig,
) -> Option<FailsafeTrip> {
    let positions = || sample.iter().zip(devices).enumerate();

    let under_power = positions().find_map(|(position, (reading, &device))| {
        let limit_w = config.min_power_draw_w.get(position);
        (reading.power_draw_w <= limit_w).then_some(FailsafeTrip::UnderPower {
            device,
            power_draw_w: reading.power_draw_w,
            limit_w,
        })
    });

    let over_power = || {
        positions().find_map(|(position, (reading, &device))| {
            let limit_w = config.max_power_draw_w.get(position);
            (reading.power_draw_w >= limit_w).then_some(FailsafeTrip::OverPower {
                device,
                power_draw_w: reading.power_draw_w,
                limit_w,
            })
        })
    };

    under_power.or_else(over_power)
}
