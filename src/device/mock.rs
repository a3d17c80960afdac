use super::interface::{CameraDevice, DeviceRegistry};
use super::types::{
    CameraFacing, DeviceClass, DeviceInfo, ExposureMode, FocusMode, PointOfInterest,
    ResolutionPreset,
};
use crate::error::{CamkitError, Result};
use crate::frame::{FrameData, Orientation};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

/// Capability knobs for a mock device
#[derive(Debug, Clone)]
pub struct MockCaps {
    pub single_point_focus: bool,
    pub single_point_exposure: bool,
    pub focus_poi: bool,
    pub exposure_poi: bool,
    pub torch: bool,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub low_light_boost: bool,
}

impl Default for MockCaps {
    fn default() -> Self {
        Self {
            single_point_focus: true,
            single_point_exposure: true,
            focus_poi: true,
            exposure_poi: true,
            torch: true,
            min_zoom: 1.0,
            max_zoom: 8.0,
            low_light_boost: true,
        }
    }
}

#[derive(Debug)]
struct MockState {
    focus_mode: FocusMode,
    exposure_mode: ExposureMode,
    zoom: f32,
    torch_on: bool,
    focus_point: Option<PointOfInterest>,
    exposure_point: Option<PointOfInterest>,
    subject_monitoring: bool,
    low_light: bool,
    full_focus_range: bool,
    active_preset: ResolutionPreset,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            focus_mode: FocusMode::ContinuousAuto,
            exposure_mode: ExposureMode::ContinuousAuto,
            zoom: 1.0,
            torch_on: false,
            focus_point: None,
            exposure_point: None,
            subject_monitoring: false,
            low_light: false,
            full_focus_range: false,
            active_preset: ResolutionPreset::Hd1280x720,
        }
    }
}

/// In-process camera device producing synthetic frames, with full capability
/// knobs and call accounting for tests.
pub struct MockCamera {
    info: DeviceInfo,
    caps: MockCaps,
    fps: u32,
    frame_dims_override: Option<(u32, u32)>,
    state: Mutex<MockState>,
    running: Arc<AtomicBool>,
    frame_counter: Arc<AtomicU64>,
    stream_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    subject_tx: broadcast::Sender<()>,
    focus_point_calls: AtomicU64,
    fail_focus_config: AtomicBool,
    fail_still: AtomicBool,
}

impl MockCamera {
    pub fn new<S: Into<String>>(id: S, facing: CameraFacing, class: DeviceClass) -> Self {
        let (subject_tx, _) = broadcast::channel(8);
        Self {
            info: DeviceInfo {
                id: id.into(),
                facing,
                class,
            },
            caps: MockCaps::default(),
            fps: 30,
            frame_dims_override: None,
            state: Mutex::new(MockState::default()),
            running: Arc::new(AtomicBool::new(false)),
            frame_counter: Arc::new(AtomicU64::new(0)),
            stream_task: Mutex::new(None),
            subject_tx,
            focus_point_calls: AtomicU64::new(0),
            fail_focus_config: AtomicBool::new(false),
            fail_still: AtomicBool::new(false),
        }
    }

    pub fn with_caps(mut self, caps: MockCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Override the dimensions of delivered frames regardless of preset
    pub fn with_frame_dims(mut self, width: u32, height: u32) -> Self {
        self.frame_dims_override = Some((width, height));
        self
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Number of focus point-of-interest writes this device has seen
    pub fn focus_point_calls(&self) -> u64 {
        self.focus_point_calls.load(Ordering::Relaxed)
    }

    pub fn last_focus_point(&self) -> Option<PointOfInterest> {
        self.state.lock().focus_point
    }

    pub fn torch_on(&self) -> bool {
        self.state.lock().torch_on
    }

    /// Make focus/exposure mode configuration fail, for degraded-path tests
    pub fn set_focus_config_failure(&self, fail: bool) {
        self.fail_focus_config.store(fail, Ordering::Relaxed);
    }

    pub fn set_still_failure(&self, fail: bool) {
        self.fail_still.store(fail, Ordering::Relaxed);
    }

    /// Simulate a hardware subject-area-changed notification
    pub fn trigger_subject_area_change(&self) {
        let _ = self.subject_tx.send(());
    }

    fn frame_dims(&self) -> (u32, u32) {
        self.frame_dims_override
            .unwrap_or_else(|| self.state.lock().active_preset.dims())
    }

    fn synthesize_frame(id: u64, width: u32, height: u32) -> FrameData {
        // Cheap per-frame varying fill; output paths only care about geometry
        let fill = (id % 200) as u8 + 20;
        let mut data = vec![fill; (width * height * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        FrameData::new(id, SystemTime::now(), data, width, height, Orientation::Portrait)
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        match mode {
            FocusMode::ContinuousAuto => true,
            FocusMode::SinglePointAuto => self.caps.single_point_focus,
            FocusMode::Locked => false,
        }
    }

    fn supports_exposure_mode(&self, mode: ExposureMode) -> bool {
        match mode {
            ExposureMode::ContinuousAuto => true,
            ExposureMode::SinglePointAuto => self.caps.single_point_exposure,
            ExposureMode::Locked => false,
        }
    }

    fn supports_focus_point_of_interest(&self) -> bool {
        self.caps.focus_poi
    }

    fn supports_exposure_point_of_interest(&self) -> bool {
        self.caps.exposure_poi
    }

    fn has_torch(&self) -> bool {
        self.caps.torch
    }

    fn min_zoom(&self) -> f32 {
        self.caps.min_zoom
    }

    fn max_zoom(&self) -> f32 {
        self.caps.max_zoom
    }

    fn supports_low_light_boost(&self) -> bool {
        self.caps.low_light_boost
    }

    fn focus_mode(&self) -> FocusMode {
        self.state.lock().focus_mode
    }

    fn exposure_mode(&self) -> ExposureMode {
        self.state.lock().exposure_mode
    }

    fn zoom(&self) -> f32 {
        self.state.lock().zoom
    }

    fn set_focus_mode(&self, mode: FocusMode) -> Result<()> {
        if self.fail_focus_config.load(Ordering::Relaxed) {
            return Err(CamkitError::hardware("focus configuration unavailable"));
        }
        if !self.supports_focus_mode(mode) {
            return Err(CamkitError::hardware(format!(
                "focus mode {:?} not supported by '{}'",
                mode, self.info.id
            )));
        }
        self.state.lock().focus_mode = mode;
        Ok(())
    }

    fn set_exposure_mode(&self, mode: ExposureMode) -> Result<()> {
        if self.fail_focus_config.load(Ordering::Relaxed) {
            return Err(CamkitError::hardware("exposure configuration unavailable"));
        }
        if !self.supports_exposure_mode(mode) {
            return Err(CamkitError::hardware(format!(
                "exposure mode {:?} not supported by '{}'",
                mode, self.info.id
            )));
        }
        self.state.lock().exposure_mode = mode;
        Ok(())
    }

    fn set_focus_point(&self, point: PointOfInterest) -> Result<()> {
        if !self.caps.focus_poi {
            return Err(CamkitError::hardware("focus point of interest unsupported"));
        }
        self.focus_point_calls.fetch_add(1, Ordering::Relaxed);
        self.state.lock().focus_point = Some(point);
        Ok(())
    }

    fn set_exposure_point(&self, point: PointOfInterest) -> Result<()> {
        if !self.caps.exposure_poi {
            return Err(CamkitError::hardware(
                "exposure point of interest unsupported",
            ));
        }
        self.state.lock().exposure_point = Some(point);
        Ok(())
    }

    fn set_zoom(&self, factor: f32) -> Result<()> {
        self.state.lock().zoom = factor;
        Ok(())
    }

    fn set_torch(&self, on: bool) -> Result<()> {
        if !self.caps.torch {
            return Err(CamkitError::hardware("device has no torch"));
        }
        self.state.lock().torch_on = on;
        Ok(())
    }

    fn set_subject_area_monitoring(&self, enabled: bool) -> Result<()> {
        self.state.lock().subject_monitoring = enabled;
        Ok(())
    }

    fn set_low_light_boost(&self, enabled: bool) -> Result<()> {
        self.state.lock().low_light = enabled;
        Ok(())
    }

    fn set_full_focus_range(&self) -> Result<()> {
        self.state.lock().full_focus_range = true;
        Ok(())
    }

    async fn start_stream(&self, preset: ResolutionPreset) -> Result<mpsc::Receiver<FrameData>> {
        self.state.lock().active_preset = preset;
        let (width, height) = self.frame_dims();
        let (tx, rx) = mpsc::channel(4);

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let interval = Duration::from_millis(1000 / self.fps as u64);
        let id = self.info.id.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            debug!("Mock stream started for '{}' at {}x{}", id, width, height);
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let frame = MockCamera::synthesize_frame(frame_id, width, height);
                trace!("Mock frame {} generated ({}x{})", frame_id, width, height);
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("Mock stream stopped for '{}'", id);
        });

        *self.stream_task.lock() = Some(task);
        Ok(rx)
    }

    async fn stop_stream(&self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.stream_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    async fn capture_still(&self) -> Result<FrameData> {
        if self.fail_still.load(Ordering::Relaxed) {
            return Err(CamkitError::hardware("still capture failed"));
        }
        // Stills come from the dedicated photo sink at full sensor resolution
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Self::synthesize_frame(frame_id, 1920, 1080))
    }

    fn subject_area_events(&self) -> broadcast::Receiver<()> {
        self.subject_tx.subscribe()
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.stream_task.lock().take() {
            task.abort();
        }
    }
}

/// Registry over a fixed set of mock devices
pub struct MockRegistry {
    devices: Vec<Arc<MockCamera>>,
}

impl MockRegistry {
    pub fn new(devices: Vec<Arc<MockCamera>>) -> Self {
        Self { devices }
    }

    /// Typical phone layout: multi-lens back system plus a single front lens
    pub fn standard() -> Self {
        Self::standard_with_fps(30)
    }

    /// The standard layout with every device ticking at the given frame rate
    pub fn standard_with_fps(fps: u32) -> Self {
        Self::new(vec![
            Arc::new(
                MockCamera::new("back-triple", CameraFacing::Back, DeviceClass::TripleLens)
                    .with_fps(fps),
            ),
            Arc::new(
                MockCamera::new("back-wide", CameraFacing::Back, DeviceClass::WideAngle)
                    .with_fps(fps),
            ),
            Arc::new(
                MockCamera::new("front-wide", CameraFacing::Front, DeviceClass::WideAngle)
                    .with_fps(fps),
            ),
        ])
    }

    pub fn device(&self, id: &str) -> Option<Arc<MockCamera>> {
        self.devices.iter().find(|d| d.info.id == id).cloned()
    }
}

impl DeviceRegistry for MockRegistry {
    fn enumerate(&self) -> Vec<Arc<dyn CameraDevice>> {
        self.devices
            .iter()
            .map(|d| Arc::clone(d) as Arc<dyn CameraDevice>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_delivers_frames_at_preset_dims() {
        let camera = MockCamera::new("m", CameraFacing::Back, DeviceClass::WideAngle)
            .with_fps(100);
        let mut rx = camera
            .start_stream(ResolutionPreset::Vga640x480)
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert!(frame.validate_size());

        camera.stop_stream().await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_dims_override() {
        let camera = MockCamera::new("m", CameraFacing::Back, DeviceClass::WideAngle)
            .with_fps(100)
            .with_frame_dims(1000, 1000);
        let mut rx = camera
            .start_stream(ResolutionPreset::Hd1280x720)
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!((frame.width, frame.height), (1000, 1000));
        camera.stop_stream().await.unwrap();
    }

    #[test]
    fn test_unsupported_controls_error() {
        let camera = MockCamera::new("m", CameraFacing::Front, DeviceClass::WideAngle).with_caps(
            MockCaps {
                torch: false,
                single_point_focus: false,
                ..MockCaps::default()
            },
        );

        assert!(camera.set_torch(true).is_err());
        assert!(camera.set_focus_mode(FocusMode::SinglePointAuto).is_err());
        assert!(camera.set_focus_mode(FocusMode::ContinuousAuto).is_ok());
    }

    #[test]
    fn test_standard_registry_fps_override() {
        let registry = MockRegistry::standard_with_fps(120);
        for id in ["back-triple", "back-wide", "front-wide"] {
            assert_eq!(registry.device(id).unwrap().fps(), 120);
        }
        assert_eq!(MockRegistry::standard().device("back-wide").unwrap().fps(), 30);
    }

    #[test]
    fn test_focus_point_accounting() {
        let camera = MockCamera::new("m", CameraFacing::Back, DeviceClass::WideAngle);
        assert_eq!(camera.focus_point_calls(), 0);
        camera.set_focus_point(PointOfInterest::new(0.3, 0.7)).unwrap();
        assert_eq!(camera.focus_point_calls(), 1);
        assert_eq!(camera.last_focus_point(), Some(PointOfInterest::new(0.3, 0.7)));
    }
}
