use super::interface::{CameraDevice, DeviceRegistry};
use super::types::{CameraFacing, DeviceClass};
use crate::error::{CamkitError, Result};
use std::sync::Arc;
use tracing::debug;

/// Pick the best available device at the requested facing.
///
/// Walks the ranked capability classes most-capable first and returns the
/// first device matching the facing under the highest-ranked class present;
/// falls back to any device at that facing, and fails with `DeviceNotFound`
/// when none exists. No side effects.
pub fn select_device(
    registry: &dyn DeviceRegistry,
    facing: CameraFacing,
) -> Result<Arc<dyn CameraDevice>> {
    let devices = registry.enumerate();

    for class in DeviceClass::RANKED {
        if let Some(device) = devices
            .iter()
            .find(|d| d.info().facing == facing && d.info().class == class)
        {
            debug!(
                "Selected {:?} device '{}' for {:?} facing",
                class,
                device.info().id,
                facing
            );
            return Ok(Arc::clone(device));
        }
    }

    if let Some(device) = devices.iter().find(|d| d.info().facing == facing) {
        debug!(
            "No ranked class present; selected '{}' for {:?} facing",
            device.info().id,
            facing
        );
        return Ok(Arc::clone(device));
    }

    Err(CamkitError::DeviceNotFound { facing })
}
