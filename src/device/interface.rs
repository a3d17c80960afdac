use super::types::{
    DeviceInfo, ExposureMode, FocusMode, PointOfInterest, ResolutionPreset,
};
use crate::error::Result;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Capability-query and control surface over a physical camera device.
///
/// The orchestrator and focus controller only talk to this trait, so they
/// stay platform-agnostic and can run against a mock. Control setters return
/// an error when the underlying configuration fails; callers decide whether
/// that is fatal (it usually is not — best-effort adjustments are logged and
/// swallowed).
#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn info(&self) -> DeviceInfo;

    // Capability queries
    fn supports_focus_mode(&self, mode: FocusMode) -> bool;
    fn supports_exposure_mode(&self, mode: ExposureMode) -> bool;
    fn supports_focus_point_of_interest(&self) -> bool;
    fn supports_exposure_point_of_interest(&self) -> bool;
    fn has_torch(&self) -> bool;
    fn min_zoom(&self) -> f32;
    fn max_zoom(&self) -> f32;
    fn supports_low_light_boost(&self) -> bool;

    // Current mode state
    fn focus_mode(&self) -> FocusMode;
    fn exposure_mode(&self) -> ExposureMode;
    fn zoom(&self) -> f32;

    // Control setters
    fn set_focus_mode(&self, mode: FocusMode) -> Result<()>;
    fn set_exposure_mode(&self, mode: ExposureMode) -> Result<()>;
    fn set_focus_point(&self, point: PointOfInterest) -> Result<()>;
    fn set_exposure_point(&self, point: PointOfInterest) -> Result<()>;
    fn set_zoom(&self, factor: f32) -> Result<()>;
    fn set_torch(&self, on: bool) -> Result<()>;
    fn set_subject_area_monitoring(&self, enabled: bool) -> Result<()>;
    fn set_low_light_boost(&self, enabled: bool) -> Result<()>;
    fn set_full_focus_range(&self) -> Result<()>;

    /// Start the continuous frame stream at the given preset. Frames arrive
    /// serialized on the returned channel until `stop_stream`.
    async fn start_stream(&self, preset: ResolutionPreset) -> Result<mpsc::Receiver<FrameData>>;

    async fn stop_stream(&self) -> Result<()>;

    /// Dedicated high-resolution still capture, distinct from the live stream
    async fn capture_still(&self) -> Result<FrameData>;

    /// Hardware "subject area changed" notifications
    fn subject_area_events(&self) -> broadcast::Receiver<()>;
}

/// Enumerates the camera devices known to the platform
pub trait DeviceRegistry: Send + Sync {
    fn enumerate(&self) -> Vec<Arc<dyn CameraDevice>>;
}
