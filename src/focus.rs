use crate::config::FocusConfig;
use crate::device::{CameraDevice, ExposureMode, FocusMode, PointOfInterest};
use crate::error::{CamkitError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drives point-of-interest focus and exposure on a single device.
///
/// A tap produces a transaction: both points of interest are written, the
/// device switches to single-shot modes, and two timers start. The settle
/// timer reverts to continuous modes so the device keeps adapting after the
/// subject is acquired; the indicator timer clears the pending-indicator flag
/// the host uses to draw its reticle. A hardware subject-area-changed
/// notification short-circuits both.
///
/// Requests arriving inside the throttle window are dropped silently; hardware
/// configuration failures are logged and swallowed so a tap can never take the
/// session down. Must be constructed inside a Tokio runtime.
pub struct FocusController {
    device: Arc<dyn CameraDevice>,
    config: FocusConfig,
    last_request: Mutex<Option<Instant>>,
    indicator_pending: Arc<AtomicBool>,
    pending: Arc<Mutex<Option<CancellationToken>>>,
    subject_task: Mutex<Option<JoinHandle<()>>>,
}

impl FocusController {
    pub fn new(device: Arc<dyn CameraDevice>, config: FocusConfig) -> Self {
        let indicator_pending = Arc::new(AtomicBool::new(false));
        let pending: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));

        let subject_task = {
            let device = Arc::clone(&device);
            let indicator_pending = Arc::clone(&indicator_pending);
            let pending = Arc::clone(&pending);
            let mut events = device.subject_area_events();
            tokio::spawn(async move {
                while events.recv().await.is_ok() {
                    debug!("Subject area changed; reverting to continuous focus");
                    if let Some(token) = pending.lock().take() {
                        token.cancel();
                    }
                    revert_to_continuous(device.as_ref());
                    indicator_pending.store(false, Ordering::Relaxed);
                }
            })
        };

        Self {
            device,
            config,
            last_request: Mutex::new(None),
            indicator_pending,
            pending,
            subject_task: Mutex::new(Some(subject_task)),
        }
    }

    /// Baseline adjustment state applied whenever a device is (re)bound:
    /// continuous focus and exposure, full focus range, subject-area
    /// monitoring, and low-light boost where available. Every step is
    /// best-effort.
    pub fn apply_defaults(&self) {
        let device = self.device.as_ref();
        revert_to_continuous(device);
        if let Err(e) = device.set_full_focus_range() {
            warn!("Could not set full focus range: {}", e);
        }
        if let Err(e) = device.set_subject_area_monitoring(true) {
            warn!("Could not enable subject area monitoring: {}", e);
        }
        if device.supports_low_light_boost() {
            if let Err(e) = device.set_low_light_boost(true) {
                warn!("Could not enable low-light boost: {}", e);
            }
        }
    }

    /// Begin a focus/exposure transaction at a normalized point.
    ///
    /// Rejects out-of-range coordinates before touching the device. A request
    /// inside the throttle window is accepted but does nothing.
    pub fn focus_at(&self, point: PointOfInterest) -> Result<()> {
        if !point.is_normalized() {
            return Err(CamkitError::invalid_argument(format!(
                "focus point ({}, {}) outside [0, 1]",
                point.x, point.y
            )));
        }

        {
            let mut last = self.last_request.lock();
            if let Some(at) = *last {
                if at.elapsed() < Duration::from_millis(self.config.throttle_ms) {
                    debug!("Focus request throttled");
                    return Ok(());
                }
            }
            *last = Some(Instant::now());
        }

        self.begin_transaction(point);
        Ok(())
    }

    /// Drop any in-flight transaction and recenter on continuous adjustment.
    /// Not subject to the throttle; the next tap starts a fresh window.
    pub fn reset_focus(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
        *self.last_request.lock() = None;

        let device = self.device.as_ref();
        if device.supports_focus_point_of_interest() {
            if let Err(e) = device.set_focus_point(PointOfInterest::CENTER) {
                warn!("Could not recenter focus point: {}", e);
            }
        }
        if device.supports_exposure_point_of_interest() {
            if let Err(e) = device.set_exposure_point(PointOfInterest::CENTER) {
                warn!("Could not recenter exposure point: {}", e);
            }
        }
        revert_to_continuous(device);
        self.indicator_pending.store(false, Ordering::Relaxed);
    }

    /// Whether a transaction's visual indicator is still due on screen
    pub fn indicator_pending(&self) -> bool {
        self.indicator_pending.load(Ordering::Relaxed)
    }

    fn begin_transaction(&self, point: PointOfInterest) {
        let token = CancellationToken::new();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }
        self.indicator_pending.store(true, Ordering::Relaxed);

        let device = self.device.as_ref();
        if device.supports_focus_point_of_interest() {
            if let Err(e) = device.set_focus_point(point) {
                warn!("Could not set focus point: {}", e);
            }
        }
        if device.supports_exposure_point_of_interest() {
            if let Err(e) = device.set_exposure_point(point) {
                warn!("Could not set exposure point: {}", e);
            }
        }

        let focus_mode = if device.supports_focus_mode(FocusMode::SinglePointAuto) {
            FocusMode::SinglePointAuto
        } else {
            FocusMode::ContinuousAuto
        };
        if let Err(e) = device.set_focus_mode(focus_mode) {
            warn!("Could not set focus mode {:?}: {}", focus_mode, e);
        }
        let exposure_mode = if device.supports_exposure_mode(ExposureMode::SinglePointAuto) {
            ExposureMode::SinglePointAuto
        } else {
            ExposureMode::ContinuousAuto
        };
        if let Err(e) = device.set_exposure_mode(exposure_mode) {
            warn!("Could not set exposure mode {:?}: {}", exposure_mode, e);
        }

        // Settle: give the single-shot adjustment time to land, then hand
        // control back to continuous mode
        let settle = Duration::from_millis(self.config.settle_ms);
        let settle_device = Arc::clone(&self.device);
        let settle_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = settle_token.cancelled() => {}
                _ = tokio::time::sleep(settle) => {
                    revert_to_continuous(settle_device.as_ref());
                }
            }
        });

        // Indicator: clears later than the settle revert
        let indicator = Duration::from_millis(self.config.indicator_ms);
        let indicator_flag = Arc::clone(&self.indicator_pending);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(indicator) => {
                    indicator_flag.store(false, Ordering::Relaxed);
                }
            }
        });
    }
}

fn revert_to_continuous(device: &dyn CameraDevice) {
    if let Err(e) = device.set_focus_mode(FocusMode::ContinuousAuto) {
        warn!("Could not restore continuous focus: {}", e);
    }
    if let Err(e) = device.set_exposure_mode(ExposureMode::ContinuousAuto) {
        warn!("Could not restore continuous exposure: {}", e);
    }
}

impl Drop for FocusController {
    fn drop(&mut self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
        if let Some(task) = self.subject_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockCamera, MockCaps};
    use crate::device::{CameraFacing, DeviceClass};

    fn fast_config() -> FocusConfig {
        FocusConfig {
            throttle_ms: 200,
            settle_ms: 50,
            indicator_ms: 120,
        }
    }

    fn camera() -> Arc<MockCamera> {
        Arc::new(MockCamera::new(
            "back-wide",
            CameraFacing::Back,
            DeviceClass::WideAngle,
        ))
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_point_without_device_call() {
        let camera = camera();
        let controller = FocusController::new(camera.clone(), fast_config());

        let result = controller.focus_at(PointOfInterest::new(1.2, 0.5));
        assert!(matches!(result, Err(CamkitError::InvalidArgument { .. })));
        assert_eq!(camera.focus_point_calls(), 0);
        assert!(!controller.indicator_pending());
    }

    #[tokio::test]
    async fn test_throttle_drops_rapid_requests_silently() {
        let camera = camera();
        let controller = FocusController::new(camera.clone(), fast_config());

        controller.focus_at(PointOfInterest::new(0.2, 0.2)).unwrap();
        controller.focus_at(PointOfInterest::new(0.8, 0.8)).unwrap();
        assert_eq!(camera.focus_point_calls(), 1);
        assert_eq!(camera.last_focus_point(), Some(PointOfInterest::new(0.2, 0.2)));

        tokio::time::sleep(Duration::from_millis(250)).await;
        controller.focus_at(PointOfInterest::new(0.8, 0.8)).unwrap();
        assert_eq!(camera.focus_point_calls(), 2);
    }

    #[tokio::test]
    async fn test_settle_reverts_to_continuous() {
        let camera = camera();
        let controller = FocusController::new(camera.clone(), fast_config());

        controller.focus_at(PointOfInterest::new(0.5, 0.5)).unwrap();
        assert_eq!(camera.focus_mode(), FocusMode::SinglePointAuto);
        assert_eq!(camera.exposure_mode(), ExposureMode::SinglePointAuto);

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(camera.focus_mode(), FocusMode::ContinuousAuto);
        assert_eq!(camera.exposure_mode(), ExposureMode::ContinuousAuto);
        // Indicator outlives the settle revert
        assert!(controller.indicator_pending());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!controller.indicator_pending());
    }

    #[tokio::test]
    async fn test_subject_area_change_clears_transaction() {
        let camera = camera();
        let controller = FocusController::new(camera.clone(), fast_config());

        controller.focus_at(PointOfInterest::new(0.3, 0.3)).unwrap();
        assert!(controller.indicator_pending());

        camera.trigger_subject_area_change();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!controller.indicator_pending());
        assert_eq!(camera.focus_mode(), FocusMode::ContinuousAuto);
    }

    #[tokio::test]
    async fn test_reset_recenters_and_bypasses_throttle() {
        let camera = camera();
        let controller = FocusController::new(camera.clone(), fast_config());

        controller.focus_at(PointOfInterest::new(0.9, 0.1)).unwrap();
        controller.reset_focus();

        assert_eq!(camera.last_focus_point(), Some(PointOfInterest::CENTER));
        assert!(!controller.indicator_pending());

        // Immediately after a reset the next tap must go through
        controller.focus_at(PointOfInterest::new(0.1, 0.9)).unwrap();
        assert_eq!(camera.last_focus_point(), Some(PointOfInterest::new(0.1, 0.9)));
    }

    #[tokio::test]
    async fn test_degrades_on_limited_device() {
        let camera = Arc::new(
            MockCamera::new("front-wide", CameraFacing::Front, DeviceClass::WideAngle).with_caps(
                MockCaps {
                    single_point_focus: false,
                    single_point_exposure: false,
                    focus_poi: false,
                    exposure_poi: false,
                    low_light_boost: false,
                    ..MockCaps::default()
                },
            ),
        );
        let controller = FocusController::new(camera.clone(), fast_config());
        controller.apply_defaults();

        // No capable controls, but the tap still succeeds
        controller.focus_at(PointOfInterest::new(0.5, 0.5)).unwrap();
        assert_eq!(camera.focus_point_calls(), 0);
        assert_eq!(camera.focus_mode(), FocusMode::ContinuousAuto);
    }
}
