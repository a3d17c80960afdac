use super::graph::{DeviceGraph, SharedFrameState};
use super::recording::{MovieWriter, RecordingResult};
use crate::config::CamkitConfig;
use crate::device::{
    select_device, CameraDevice, CameraFacing, DeviceInfo, DeviceRegistry, ExposureMode,
    FocusMode, PointOfInterest, ResolutionPreset,
};
use crate::error::{CamkitError, Result};
use crate::events::{CameraEvent, EventBus};
use crate::focus::FocusController;
use crate::frame::{FramePipeline, Orientation, ScanRegion};
use crate::layout::PreviewLayout;
use crate::permissions::{PermissionGrant, PermissionProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Stopped,
    Running,
}

/// Result of a dedicated still capture. The image is always written to
/// disk; `path` is the caller's destination or a generated temporary file.
#[derive(Debug, Clone)]
pub struct PhotoResult {
    pub path: PathBuf,
    pub base64: Option<String>,
}

struct SessionInner {
    state: SessionState,
    facing: CameraFacing,
    preset: ResolutionPreset,
    device: Option<Arc<dyn CameraDevice>>,
    focus: Option<Arc<FocusController>>,
    graph: Option<DeviceGraph>,
    torch_on: bool,
    layout: Option<PreviewLayout>,
    audio_enabled: bool,
}

/// The aggregate root of the capture pipeline.
///
/// All operations are serialized behind one async mutex, so every
/// reconfiguration observes a consistent device graph and the
/// teardown/rebuild discipline never interleaves. The frame delivery task
/// runs outside that lock and only reads the shared state, so frame flow is
/// never blocked by control calls.
pub struct CaptureSession {
    inner: Mutex<SessionInner>,
    shared: Arc<SharedFrameState>,
    events: EventBus,
    registry: Arc<dyn DeviceRegistry>,
    permissions: Arc<dyn PermissionProvider>,
    config: CamkitConfig,
}

impl CaptureSession {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        permissions: Arc<dyn PermissionProvider>,
        config: CamkitConfig,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                facing: config.session.default_facing,
                preset: config.session.default_resolution,
                device: None,
                focus: None,
                graph: None,
                torch_on: false,
                layout: None,
                audio_enabled: false,
            }),
            shared: Arc::new(SharedFrameState::new()),
            events: EventBus::default(),
            registry,
            permissions,
            config,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Check permission, bind the preferred device at the requested facing
    /// and move to `Stopped`. A denied or restricted camera permission is
    /// terminal and leaves the session unbound.
    pub async fn initialize(
        &self,
        facing: Option<CameraFacing>,
        preset: Option<ResolutionPreset>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Uninitialized {
            return Err(CamkitError::invalid_argument("session already initialized"));
        }

        let status = self.permissions.camera_status();
        if status.is_terminal_failure() {
            return Err(CamkitError::permission_denied(format!(
                "camera permission is {:?}",
                status
            )));
        }
        if !self.permissions.request_camera().await.granted {
            return Err(CamkitError::permission_denied(
                "camera permission request was refused",
            ));
        }

        inner.facing = facing.unwrap_or(self.config.session.default_facing);
        inner.preset = effective_preset(
            preset.unwrap_or(self.config.session.default_resolution),
            inner.facing,
        );
        self.bind_device(&mut inner)?;
        inner.state = SessionState::Stopped;
        info!(
            "Session initialized: {:?} facing at {:?}",
            inner.facing, inner.preset
        );
        Ok(())
    }

    /// Start streaming. Returns as soon as the graph is up; the `Played`
    /// notification fires when the first frame is observed.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Uninitialized => {
                Err(CamkitError::not_initialized("start requires initialize"))
            }
            SessionState::Running => {
                debug!("start() while already running is a no-op");
                Ok(())
            }
            SessionState::Stopped => self.rebuild(&mut inner).await,
        }
    }

    /// Tear the live graph down and return to `Stopped`. An active recording
    /// is discarded.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Uninitialized => {
                Err(CamkitError::not_initialized("stop requires initialize"))
            }
            SessionState::Stopped => Ok(()),
            SessionState::Running => {
                if let Some(recorder) = self.shared.recorder.lock().take() {
                    warn!("Stopping with an active recording; discarding it");
                    if let Err(e) = recorder.finish(false) {
                        warn!("Error discarding recording: {}", e);
                    }
                }
                if let Some(graph) = inner.graph.take() {
                    graph.teardown(&self.shared).await;
                }
                inner.state = SessionState::Stopped;
                Ok(())
            }
        }
    }

    /// Rebind to the preferred device at the other facing. A no-op when the
    /// facing is unchanged; otherwise the running state is preserved across
    /// the rebuild and orientation resets to portrait.
    pub async fn switch_camera(&self, facing: CameraFacing) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Uninitialized {
            return Err(CamkitError::not_initialized(
                "switch_camera requires initialize",
            ));
        }
        if inner.facing == facing {
            debug!("switch_camera to the current facing is a no-op");
            return Ok(());
        }

        // Select before tearing anything down so a missing device leaves the
        // current graph intact
        let device = select_device(self.registry.as_ref(), facing)?;

        let was_running = inner.state == SessionState::Running;
        if let Some(graph) = inner.graph.take() {
            graph.teardown(&self.shared).await;
        }

        inner.facing = facing;
        inner.torch_on = false;
        *self.shared.orientation.lock() = Orientation::Portrait;

        let focus = Arc::new(FocusController::new(
            Arc::clone(&device),
            self.config.focus.clone(),
        ));
        focus.apply_defaults();
        inner.device = Some(device);
        inner.focus = Some(focus);

        if was_running {
            self.rebuild(&mut inner).await?;
        } else {
            inner.state = SessionState::Stopped;
        }
        info!("Switched to {:?} facing", facing);
        Ok(())
    }

    /// Apply a resolution preset by numeric index. A preset unavailable at
    /// the current facing leaves the active preset in place; when running,
    /// the stream restarts and `Played` is re-emitted with the new
    /// dimensions.
    pub async fn set_resolution(&self, index: u8) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Uninitialized {
            return Err(CamkitError::not_initialized(
                "set_resolution requires initialize",
            ));
        }
        let preset = ResolutionPreset::from_index(index).ok_or_else(|| {
            CamkitError::invalid_argument(format!("unknown resolution preset index {}", index))
        })?;
        if inner.facing == CameraFacing::Front && preset.back_only() {
            debug!("{:?} unavailable on the front camera, keeping {:?}", preset, inner.preset);
            return Ok(());
        }
        if preset == inner.preset {
            return Ok(());
        }

        inner.preset = preset;
        if inner.state == SessionState::Running {
            self.rebuild(&mut inner).await?;
        }
        Ok(())
    }

    pub async fn set_scan_region(&self, region: Option<ScanRegion>) -> Result<()> {
        if let Some(region) = &region {
            region.validate()?;
        }
        *self.shared.scan_region.lock() = region;
        Ok(())
    }

    /// Clamp to the device's zoom range and apply. Never fails; an
    /// out-of-range request applies the nearest bound and hardware errors
    /// are logged.
    pub async fn set_zoom(&self, factor: f32) -> Result<()> {
        let inner = self.inner.lock().await;
        let device = bound_device(&inner)?;
        let clamped = factor.clamp(device.min_zoom(), device.max_zoom());
        if clamped != factor {
            debug!("Zoom {} clamped to {}", factor, clamped);
        }
        if let Err(e) = device.set_zoom(clamped) {
            warn!("Could not apply zoom {}: {}", clamped, e);
        }
        Ok(())
    }

    /// Best-effort torch control; a no-op on devices without one
    pub async fn toggle_torch(&self, on: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let device = bound_device(&inner)?;
        if !device.has_torch() {
            debug!("Torch request ignored: device has none");
            return Ok(());
        }
        match device.set_torch(on) {
            Ok(()) => inner.torch_on = on,
            Err(e) => warn!("Could not set torch: {}", e),
        }
        Ok(())
    }

    pub async fn focus_at(&self, point: PointOfInterest) -> Result<()> {
        let inner = self.inner.lock().await;
        bound_focus(&inner)?.focus_at(point)
    }

    pub async fn reset_focus(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        bound_focus(&inner)?.reset_focus();
        Ok(())
    }

    pub async fn indicator_pending(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.focus.as_ref().is_some_and(|f| f.indicator_pending())
    }

    /// Base64 JPEG of the next delivered frame, orientation-normalized and
    /// cropped by the active scan region. A later snapshot request supersedes
    /// an unfulfilled one.
    pub async fn take_snapshot(&self, quality: u8) -> Result<String> {
        validate_quality(quality)?;
        let rx = {
            let inner = self.inner.lock().await;
            require_running(&inner, "take_snapshot")?;
            self.shared.tickets.lock().issue_snapshot(quality)
        };
        rx.await
            .map_err(|_| superseded("snapshot"))?
    }

    /// Capture the next delivered frame, orientation-normalized and cropped
    /// by the active scan region, into the session's single capture slot.
    /// `get_bitmap` hands the slot back; each capture replaces the previous
    /// one.
    pub async fn save_frame(&self) -> Result<()> {
        let rx = {
            let inner = self.inner.lock().await;
            require_running(&inner, "save_frame")?;
            self.shared.tickets.lock().issue_save_frame()
        };
        rx.await.map_err(|_| superseded("save-frame"))?
    }

    /// "WxH" of the next delivered frame
    pub async fn get_resolution(&self) -> Result<String> {
        let rx = {
            let inner = self.inner.lock().await;
            require_running(&inner, "get_resolution")?;
            self.shared.tickets.lock().issue_resolution_probe()
        };
        rx.await.map_err(|_| superseded("resolution probe"))
    }

    /// Dedicated still capture with a focus lock around it: switch to
    /// single-shot auto-focus and auto-exposure, let them settle, capture,
    /// then restore the prior modes after a grace delay. The image always
    /// lands on disk, at the caller's path or a generated temporary one; the
    /// result resolves when it is written, not when the modes are restored.
    /// A focus configuration failure skips the lock and captures immediately.
    pub async fn take_photo(
        &self,
        path: Option<PathBuf>,
        include_base64: bool,
        quality: u8,
    ) -> Result<PhotoResult> {
        validate_quality(quality)?;
        let path =
            path.unwrap_or_else(|| std::env::temp_dir().join(format!("{}.jpg", Uuid::new_v4())));
        let inner = self.inner.lock().await;
        require_running(&inner, "take_photo")?;
        let device = bound_device(&inner)?;

        let prior_focus = device.focus_mode();
        let prior_exposure = device.exposure_mode();
        let locked = if device.supports_focus_mode(FocusMode::SinglePointAuto) {
            match device.set_focus_mode(FocusMode::SinglePointAuto) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Focus lock unavailable, capturing immediately: {}", e);
                    false
                }
            }
        } else {
            false
        };
        if locked {
            if device.supports_exposure_mode(ExposureMode::SinglePointAuto) {
                if let Err(e) = device.set_exposure_mode(ExposureMode::SinglePointAuto) {
                    warn!("Could not lock exposure for capture: {}", e);
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.photo.settle_ms)).await;
        }

        let mut frame = device.capture_still().await?;
        frame.orientation = *self.shared.orientation.lock();
        let image = FramePipeline::normalize(&frame)?;

        let jpeg = FramePipeline::encode_jpeg(&image, quality)?;
        std::fs::write(&path, jpeg).map_err(|e| {
            CamkitError::encoding(format!("could not write {}: {}", path.display(), e))
        })?;
        let base64 = if include_base64 {
            Some(FramePipeline::to_base64_jpeg(&image, quality)?)
        } else {
            None
        };

        if locked {
            let restore_ms = self.config.photo.restore_ms;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(restore_ms)).await;
                if let Err(e) = device.set_focus_mode(prior_focus) {
                    warn!("Could not restore focus mode: {}", e);
                }
                if let Err(e) = device.set_exposure_mode(prior_exposure) {
                    warn!("Could not restore exposure mode: {}", e);
                }
            });
        }

        Ok(PhotoResult { path, base64 })
    }

    /// Owned copy of the frame most recently stored by `save_frame`
    pub async fn get_bitmap(&self) -> Result<image::RgbaImage> {
        self.shared
            .captured
            .lock()
            .clone()
            .ok_or_else(|| CamkitError::not_initialized("no frame has been captured yet"))
    }

    /// Begin recording delivered frames to an MJPEG stream file. The graph is
    /// rebuilt with the recorder attached, starting the stream if needed.
    pub async fn start_recording(&self, path: Option<PathBuf>, with_audio: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Uninitialized {
            return Err(CamkitError::not_initialized(
                "start_recording requires initialize",
            ));
        }
        if self.shared.recorder.lock().is_some() {
            return Err(CamkitError::invalid_argument("recording already in progress"));
        }

        inner.audio_enabled = if with_audio {
            let grant = self.permissions.request_microphone().await;
            if !grant.granted {
                warn!("Microphone permission refused; recording without audio");
            }
            grant.granted
        } else {
            false
        };

        let writer = MovieWriter::create(path.as_deref())?;
        *self.shared.recorder.lock() = Some(writer);
        self.rebuild(&mut inner).await
    }

    /// Flush the recording and return it, then rebuild the graph without the
    /// recorder. The stream keeps running.
    pub async fn stop_recording(&self, include_base64: bool) -> Result<RecordingResult> {
        let mut inner = self.inner.lock().await;
        let recorder = self
            .shared
            .recorder
            .lock()
            .take()
            .ok_or_else(|| CamkitError::invalid_argument("no active recording"))?;

        if let Some(graph) = inner.graph.take() {
            graph.teardown(&self.shared).await;
        }
        let result = recorder.finish(include_base64)?;
        inner.audio_enabled = false;
        self.rebuild(&mut inner).await?;
        Ok(result)
    }

    /// Resolve and remember the preview placement. Malformed layout strings
    /// are rejected before anything else happens.
    pub async fn set_layout(
        &self,
        left: &str,
        top: &str,
        width: &str,
        height: &str,
        container_width: f32,
        container_height: f32,
    ) -> Result<PreviewLayout> {
        let layout =
            PreviewLayout::resolve(left, top, width, height, container_width, container_height)?;
        self.inner.lock().await.layout = Some(layout);
        Ok(layout)
    }

    pub async fn layout(&self) -> Option<PreviewLayout> {
        self.inner.lock().await.layout
    }

    pub fn get_orientation(&self) -> Orientation {
        *self.shared.orientation.lock()
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        *self.shared.orientation.lock() = orientation;
        self.events
            .publish(CameraEvent::OrientationChanged { orientation });
    }

    pub fn get_all_cameras(&self) -> Vec<DeviceInfo> {
        self.registry
            .enumerate()
            .iter()
            .map(|d| d.info())
            .collect()
    }

    pub async fn get_selected_camera(&self) -> Option<DeviceInfo> {
        self.inner.lock().await.device.as_ref().map(|d| d.info())
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.state == SessionState::Running
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn torch_on(&self) -> bool {
        self.inner.lock().await.torch_on
    }

    /// Whether the active recording captures audio
    pub async fn audio_enabled(&self) -> bool {
        self.inner.lock().await.audio_enabled
    }

    /// Prompt for camera permission. A grant on an unbound session binds the
    /// device late; a refusal leaves it untouched.
    pub async fn request_camera_permission(&self) -> PermissionGrant {
        let grant = self.permissions.request_camera().await;
        if grant.granted {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Uninitialized {
                match self.bind_device(&mut inner) {
                    Ok(()) => inner.state = SessionState::Stopped,
                    Err(e) => warn!("Permission granted but no device bound: {}", e),
                }
            }
        }
        grant
    }

    pub async fn request_microphone_permission(&self) -> PermissionGrant {
        self.permissions.request_microphone().await
    }

    fn bind_device(&self, inner: &mut SessionInner) -> Result<()> {
        let device = select_device(self.registry.as_ref(), inner.facing)?;
        let focus = Arc::new(FocusController::new(
            Arc::clone(&device),
            self.config.focus.clone(),
        ));
        focus.apply_defaults();
        inner.device = Some(device);
        inner.focus = Some(focus);
        Ok(())
    }

    /// Tear down any live graph and bring a fresh one up on the bound device
    async fn rebuild(&self, inner: &mut SessionInner) -> Result<()> {
        if let Some(graph) = inner.graph.take() {
            graph.teardown(&self.shared).await;
        }
        let device = bound_device(inner)?;
        let graph = DeviceGraph::build(
            device,
            inner.preset,
            Arc::clone(&self.shared),
            self.events.clone(),
        )
        .await?;
        inner.graph = Some(graph);
        inner.state = SessionState::Running;
        Ok(())
    }
}

fn bound_device(inner: &SessionInner) -> Result<Arc<dyn CameraDevice>> {
    inner
        .device
        .clone()
        .ok_or_else(|| CamkitError::not_initialized("no camera device is bound"))
}

fn bound_focus(inner: &SessionInner) -> Result<Arc<FocusController>> {
    inner
        .focus
        .clone()
        .ok_or_else(|| CamkitError::not_initialized("no camera device is bound"))
}

fn require_running(inner: &SessionInner, operation: &str) -> Result<()> {
    if inner.state != SessionState::Running {
        return Err(CamkitError::not_initialized(format!(
            "{} requires a running stream",
            operation
        )));
    }
    Ok(())
}

/// A dropped ticket sender means a newer request of the same kind replaced
/// this one, or the graph was torn down before a frame arrived
fn superseded(kind: &str) -> CamkitError {
    CamkitError::invalid_argument(format!(
        "{} request superseded or capture stopped before fulfillment",
        kind
    ))
}

fn validate_quality(quality: u8) -> Result<()> {
    if quality > 100 {
        return Err(CamkitError::invalid_argument(format!(
            "JPEG quality {} outside 0..=100",
            quality
        )));
    }
    Ok(())
}

/// Back-only presets requested at first bind degrade to 720p on the front
/// camera; after that, unavailable requests keep the active preset instead
fn effective_preset(preset: ResolutionPreset, facing: CameraFacing) -> ResolutionPreset {
    if facing == CameraFacing::Front && preset.back_only() {
        debug!("{:?} unavailable on the front camera, using 720p", preset);
        ResolutionPreset::Hd1280x720
    } else {
        preset
    }
}
