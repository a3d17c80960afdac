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
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;

/// GStreamer-backed camera device over a V4L2 source.
///
/// Exposes the continuous frame stream and still capture; the UVC class has
/// no torch, zoom or point-of-interest controls, so those capability queries
/// answer honestly and the session layer degrades gracefully.
pub struct V4l2Camera {
    info: DeviceInfo,
    index: u32,
    fps: u32,
    modes: Mutex<(FocusMode, ExposureMode, f32)>,
    running: Arc<AtomicBool>,
    frame_counter: Arc<AtomicU64>,
    pipeline: Mutex<Option<Pipeline>>,
    stream_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    latest_tx: watch::Sender<Option<FrameData>>,
    subject_tx: broadcast::Sender<()>,
}

impl V4l2Camera {
    pub fn new(index: u32, facing: CameraFacing) -> Result<Self> {
        gstreamer::init().map_err(|e| {
            CamkitError::hardware(format!("Failed to initialize GStreamer: {}", e))
        })?;

        let (latest_tx, _) = watch::channel(None);
        let (subject_tx, _) = broadcast::channel(1);
        Ok(Self {
            info: DeviceInfo {
                id: format!("/dev/video{}", index),
                facing,
                class: DeviceClass::WideAngle,
            },
            index,
            fps: 30,
            modes: Mutex::new((FocusMode::ContinuousAuto, ExposureMode::ContinuousAuto, 1.0)),
            running: Arc::new(AtomicBool::new(false)),
            frame_counter: Arc::new(AtomicU64::new(0)),
            pipeline: Mutex::new(None),
            stream_task: Mutex::new(None),
            latest_tx,
            subject_tx,
        })
    }

    fn build_pipeline_string(&self, preset: ResolutionPreset) -> String {
        let (width, height) = preset.dims();
        format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! \
             jpegdec ! videoconvert ! video/x-raw,format=RGBA ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=4 drop=true emit-signals=false",
            self.index, width, height, self.fps
        )
    }

    fn frame_from_sample(
        sample: gstreamer::Sample,
        frame_counter: &Arc<AtomicU64>,
    ) -> Result<FrameData> {
        let buffer = sample
            .buffer()
            .ok_or_else(|| CamkitError::hardware("No buffer in sample"))?;
        let caps = sample
            .caps()
            .ok_or_else(|| CamkitError::hardware("No caps in sample"))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| CamkitError::hardware(format!("Failed to get video info: {}", e)))?;
        let map = buffer
            .map_readable()
            .map_err(|e| CamkitError::hardware(format!("Failed to map buffer: {}", e)))?;

        let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            map.as_slice().to_vec(),
            video_info.width(),
            video_info.height(),
            Orientation::Portrait,
        ))
    }
}

#[async_trait]
impl CameraDevice for V4l2Camera {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        mode == FocusMode::ContinuousAuto
    }

    fn supports_exposure_mode(&self, mode: ExposureMode) -> bool {
        mode == ExposureMode::ContinuousAuto
    }

    fn supports_focus_point_of_interest(&self) -> bool {
        false
    }

    fn supports_exposure_point_of_interest(&self) -> bool {
        false
    }

    fn has_torch(&self) -> bool {
        false
    }

    fn min_zoom(&self) -> f32 {
        1.0
    }

    fn max_zoom(&self) -> f32 {
        1.0
    }

    fn supports_low_light_boost(&self) -> bool {
        false
    }

    fn focus_mode(&self) -> FocusMode {
        self.modes.lock().0
    }

    fn exposure_mode(&self) -> ExposureMode {
        self.modes.lock().1
    }

    fn zoom(&self) -> f32 {
        self.modes.lock().2
    }

    fn set_focus_mode(&self, mode: FocusMode) -> Result<()> {
        if !self.supports_focus_mode(mode) {
            return Err(CamkitError::hardware(format!(
                "focus mode {:?} not supported by '{}'",
                mode, self.info.id
            )));
        }
        self.modes.lock().0 = mode;
        Ok(())
    }

    fn set_exposure_mode(&self, mode: ExposureMode) -> Result<()> {
        if !self.supports_exposure_mode(mode) {
            return Err(CamkitError::hardware(format!(
                "exposure mode {:?} not supported by '{}'",
                mode, self.info.id
            )));
        }
        self.modes.lock().1 = mode;
        Ok(())
    }

    fn set_focus_point(&self, _point: PointOfInterest) -> Result<()> {
        Err(CamkitError::hardware("focus point of interest unsupported"))
    }

    fn set_exposure_point(&self, _point: PointOfInterest) -> Result<()> {
        Err(CamkitError::hardware("exposure point of interest unsupported"))
    }

    fn set_zoom(&self, _factor: f32) -> Result<()> {
        Err(CamkitError::hardware("zoom unsupported on this device"))
    }

    fn set_torch(&self, _on: bool) -> Result<()> {
        Err(CamkitError::hardware("device has no torch"))
    }

    fn set_subject_area_monitoring(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn set_low_light_boost(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn set_full_focus_range(&self) -> Result<()> {
        Ok(())
    }

    async fn start_stream(&self, preset: ResolutionPreset) -> Result<mpsc::Receiver<FrameData>> {
        if self.running.swap(true, Ordering::Relaxed) {
            warn!("Stream already running on '{}'", self.info.id);
            return Err(CamkitError::hardware("stream already running"));
        }

        let pipeline_desc = self.build_pipeline_string(preset);
        info!("Creating capture pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CamkitError::hardware(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| CamkitError::hardware("Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CamkitError::hardware("Failed to get appsink"))?
            .downcast::<AppSink>()
            .map_err(|_| CamkitError::hardware("Failed to downcast to AppSink"))?;

        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let _ = sample_tx.send(sample);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CamkitError::hardware(format!("Failed to start pipeline: {}", e)))?;

        let (frame_tx, frame_rx) = mpsc::channel(4);
        let running = Arc::clone(&self.running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let latest_tx = self.latest_tx.clone();
        let id = self.info.id.clone();

        let task = tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                match sample_rx.recv().await {
                    Some(sample) => match Self::frame_from_sample(sample, &frame_counter) {
                        Ok(frame) => {
                            let _ = latest_tx.send(Some(frame.clone()));
                            if frame_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("Error processing sample on '{}': {}", id, e),
                    },
                    None => break,
                }
            }
            debug!("Capture loop stopped for '{}'", id);
        });

        *self.pipeline.lock() = Some(pipeline);
        *self.stream_task.lock() = Some(task);
        Ok(frame_rx)
    }

    async fn stop_stream(&self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(pipeline) = self.pipeline.lock().take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
        }
        if let Some(task) = self.stream_task.lock().take() {
            task.abort();
        }
        let _ = self.latest_tx.send(None);
        Ok(())
    }

    async fn capture_still(&self) -> Result<FrameData> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(CamkitError::hardware(
                "still capture requires a running stream",
            ));
        }
        // Wait for the next delivered frame; the UVC path has no photo sink
        let mut rx = self.latest_tx.subscribe();
        let deadline = std::time::Duration::from_secs(2);
        tokio::time::timeout(deadline, async {
            loop {
                rx.changed()
                    .await
                    .map_err(|_| CamkitError::hardware("stream closed"))?;
                if let Some(frame) = rx.borrow().clone() {
                    return Ok(frame);
                }
            }
        })
        .await
        .map_err(|_| CamkitError::hardware("timed out waiting for frame"))?
    }

    fn subject_area_events(&self) -> broadcast::Receiver<()> {
        self.subject_tx.subscribe()
    }
}

/// Registry over fixed V4L2 device indices, all treated as back-facing
/// wide-angle cameras.
pub struct V4l2Registry {
    devices: Vec<Arc<V4l2Camera>>,
}

impl V4l2Registry {
    pub fn new(indices: &[u32]) -> Result<Self> {
        let mut devices = Vec::with_capacity(indices.len());
        for &index in indices {
            devices.push(Arc::new(V4l2Camera::new(index, CameraFacing::Back)?));
        }
        Ok(Self { devices })
    }
}

impl DeviceRegistry for V4l2Registry {
    fn enumerate(&self) -> Vec<Arc<dyn CameraDevice>> {
        self.devices
            .iter()
            .map(|d| Arc::clone(d) as Arc<dyn CameraDevice>)
            .collect()
    }
}
