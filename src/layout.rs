use crate::error::{CamkitError, Result};
use serde::{Deserialize, Serialize};

/// One layout dimension from the host: a raw number, a percentage of the
/// container, or an explicit pixel value ("40", "80%", "120px").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutValue {
    Raw(f32),
    Percent(f32),
    Pixels(f32),
}

impl LayoutValue {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Some(number) = trimmed.strip_suffix('%') {
            let percent: f32 = number.parse().map_err(|_| {
                CamkitError::invalid_argument(format!("malformed percentage value '{}'", value))
            })?;
            return Ok(LayoutValue::Percent(percent));
        }
        if let Some(number) = trimmed.strip_suffix("px") {
            let pixels: f32 = number.parse().map_err(|_| {
                CamkitError::invalid_argument(format!("malformed pixel value '{}'", value))
            })?;
            return Ok(LayoutValue::Pixels(pixels));
        }
        let raw: f32 = trimmed.parse().map_err(|_| {
            CamkitError::invalid_argument(format!("malformed layout value '{}'", value))
        })?;
        Ok(LayoutValue::Raw(raw))
    }

    /// Resolve against the relevant container extent (width for horizontal
    /// values, height for vertical ones)
    pub fn resolve(&self, container_extent: f32) -> f32 {
        match self {
            LayoutValue::Raw(v) | LayoutValue::Pixels(v) => *v,
            LayoutValue::Percent(p) => p / 100.0 * container_extent,
        }
    }
}

/// Resolved placement of the preview surface within its container, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewLayout {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PreviewLayout {
    /// Resolve the four host-supplied layout strings against the container
    /// bounds. Malformed input is rejected before any hardware interaction.
    pub fn resolve(
        left: &str,
        top: &str,
        width: &str,
        height: &str,
        container_width: f32,
        container_height: f32,
    ) -> Result<Self> {
        Ok(Self {
            left: LayoutValue::parse(left)?.resolve(container_width),
            top: LayoutValue::parse(top)?.resolve(container_height),
            width: LayoutValue::parse(width)?.resolve(container_width),
            height: LayoutValue::parse(height)?.resolve(container_height),
        })
    }
}
