//! Resolution of the controlled device set.

use crate::error::{Error, Result};
use crate::gateway::{TelemetryField, TelemetrySource};

/// Hardware indices of every device the telemetry source can see, in
/// ascending index order.
pub async fn discover(source: &dyn TelemetrySource) -> Result<Vec<u32>> {
    let rows = source.query(TelemetryField::Index).await?;
    let mut devices: Vec<u32> = rows.into_iter().map(|row| row.device).collect();
    devices.sort_unstable();
    devices.dedup();
    Ok(devices)
}

/// Filter `all_devices` down to the positions named in `allow_list`.
///
/// Filtering is by position in `all_devices`, not by the index value, since
/// per-device configuration arrays are addressed the same way. An empty
/// allow-list keeps every device.
pub fn resolve(all_devices: &[u32], allow_list: &[usize]) -> Vec<u32> {
    all_devices
        .iter()
        .enumerate()
        .filter(|(position, _)| allow_list.is_empty() || allow_list.contains(position))
        .map(|(_, &index)| index)
        .collect()
}

/// Like [`resolve`], but an empty result is a startup error.
pub fn resolve_nonempty(all_devices: &[u32], allow_list: &[usize]) -> Result<Vec<u32>> {
    let devices = resolve(all_devices, allow_list);
    if devices.is_empty() {
        return Err(Error::NoDevices);
    }
    Ok(devices)
}
