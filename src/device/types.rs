use serde::{Deserialize, Serialize};

/// Which side of the device a camera points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraFacing {
    Front,
    Back,
}

impl CameraFacing {
    /// Host-facing display identifier for this facing direction
    pub fn display_id(&self) -> &'static str {
        match self {
            CameraFacing::Front => "Front-Facing Camera",
            CameraFacing::Back => "Back-Facing Camera",
        }
    }

    /// Parse the host-facing display identifier back into a facing
    pub fn from_display_id(id: &str) -> Option<Self> {
        match id {
            "Front-Facing Camera" => Some(CameraFacing::Front),
            "Back-Facing Camera" => Some(CameraFacing::Back),
            _ => None,
        }
    }
}

/// Capability class of a physical camera device. Multi-lens systems are
/// preferred over single-lens ones when selecting a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    TripleLens,
    DualWideLens,
    DualLens,
    WideAngle,
    Telephoto,
    UltraWide,
}

impl DeviceClass {
    /// Ranked preference order, most capable first. Classes absent from this
    /// list are never preferred, only used as a last resort.
    pub const RANKED: [DeviceClass; 4] = [
        DeviceClass::TripleLens,
        DeviceClass::DualWideLens,
        DeviceClass::DualLens,
        DeviceClass::WideAngle,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    ContinuousAuto,
    SinglePointAuto,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureMode {
    ContinuousAuto,
    SinglePointAuto,
    Locked,
}

/// Normalized point of interest within the frame, both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub x: f32,
    pub y: f32,
}

impl PointOfInterest {
    pub const CENTER: PointOfInterest = PointOfInterest { x: 0.5, y: 0.5 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Session resolution presets. Indices match the host API's 1..5 scheme; the
/// 1080p and 4K presets are only valid on the back camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPreset {
    Vga640x480,
    Hd1280x720,
    FullHd1920x1080,
    Uhd3840x2160,
}

impl ResolutionPreset {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(ResolutionPreset::Vga640x480),
            2 => Some(ResolutionPreset::Hd1280x720),
            3 => Some(ResolutionPreset::FullHd1920x1080),
            5 => Some(ResolutionPreset::Uhd3840x2160),
            _ => None,
        }
    }

    pub fn dims(&self) -> (u32, u32) {
        match self {
            ResolutionPreset::Vga640x480 => (640, 480),
            ResolutionPreset::Hd1280x720 => (1280, 720),
            ResolutionPreset::FullHd1920x1080 => (1920, 1080),
            ResolutionPreset::Uhd3840x2160 => (3840, 2160),
        }
    }

    /// Whether this preset is only available on the back camera
    pub fn back_only(&self) -> bool {
        matches!(
            self,
            ResolutionPreset::FullHd1920x1080 | ResolutionPreset::Uhd3840x2160
        )
    }
}

/// Static identity of a physical camera device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub facing: CameraFacing,
    pub class: DeviceClass,
}
