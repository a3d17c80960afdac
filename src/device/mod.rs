mod interface;
pub mod mock;
mod selector;
mod types;

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod v4l2;

pub use interface::{CameraDevice, DeviceRegistry};
pub use mock::{MockCamera, MockRegistry};
pub use selector::select_device;
pub use types::{
    CameraFacing, DeviceClass, DeviceInfo, ExposureMode, FocusMode, PointOfInterest,
    ResolutionPreset,
};
