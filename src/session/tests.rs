use super::*;
use crate::config::CamkitConfig;
use crate::device::mock::{MockCamera, MockCaps, MockRegistry};
use crate::device::{CameraDevice, CameraFacing, DeviceClass, ExposureMode, ResolutionPreset};
use crate::error::CamkitError;
use crate::events::CameraEvent;
use crate::frame::{Orientation, ScanRegion};
use crate::permissions::StaticPermissions;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn standard_session() -> (Arc<MockRegistry>, CaptureSession) {
    let registry = Arc::new(MockRegistry::standard());
    let session = CaptureSession::new(
        registry.clone(),
        Arc::new(StaticPermissions::granted()),
        CamkitConfig::default(),
    );
    (registry, session)
}

fn session_over(registry: MockRegistry) -> (Arc<MockRegistry>, CaptureSession) {
    let registry = Arc::new(registry);
    let session = CaptureSession::new(
        registry.clone(),
        Arc::new(StaticPermissions::granted()),
        CamkitConfig::default(),
    );
    (registry, session)
}

async fn expect_played(rx: &mut broadcast::Receiver<CameraEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for Played")
            .expect("event bus closed");
        if let CameraEvent::Played { resolution } = event {
            return resolution;
        }
    }
}

#[tokio::test]
async fn test_initialize_start_emits_played_with_preset_dims() {
    let (_, session) = standard_session();
    let mut events = session.events().subscribe();

    session
        .initialize(None, Some(ResolutionPreset::Vga640x480))
        .await
        .unwrap();
    assert_eq!(session.state().await, SessionState::Stopped);
    assert!(!session.is_open().await);

    session.start().await.unwrap();
    assert_eq!(expect_played(&mut events).await, "640x480");
    assert!(session.is_open().await);
}

#[tokio::test]
async fn test_operations_require_initialization() {
    let (_, session) = standard_session();

    assert!(matches!(
        session.start().await,
        Err(CamkitError::NotInitialized { .. })
    ));
    assert!(matches!(
        session.switch_camera(CameraFacing::Front).await,
        Err(CamkitError::NotInitialized { .. })
    ));
    assert!(matches!(
        session.take_snapshot(85).await,
        Err(CamkitError::NotInitialized { .. })
    ));
}

#[tokio::test]
async fn test_denied_permission_is_terminal_and_leaves_session_unbound() {
    let registry = Arc::new(MockRegistry::standard());
    let session = CaptureSession::new(
        registry,
        Arc::new(StaticPermissions::denied()),
        CamkitConfig::default(),
    );

    let result = session.initialize(None, None).await;
    assert!(matches!(result, Err(CamkitError::PermissionDenied { .. })));
    assert_eq!(session.state().await, SessionState::Uninitialized);
    assert!(session.get_selected_camera().await.is_none());

    // A later explicit request is also refused and binds nothing
    let grant = session.request_camera_permission().await;
    assert!(!grant.granted);
    assert_eq!(session.state().await, SessionState::Uninitialized);
}

#[tokio::test]
async fn test_granted_permission_request_binds_late() {
    let (_, session) = standard_session();

    let grant = session.request_camera_permission().await;
    assert!(grant.granted);
    assert_eq!(session.state().await, SessionState::Stopped);
    assert!(session.get_selected_camera().await.is_some());
}

#[tokio::test]
async fn test_set_resolution_preserves_run_state() {
    let (_, session) = standard_session();
    let mut events = session.events().subscribe();

    session.initialize(None, None).await.unwrap();
    session.set_resolution(1).await.unwrap();
    // Still stopped: changing resolution must not start the stream
    assert_eq!(session.state().await, SessionState::Stopped);

    session.start().await.unwrap();
    assert_eq!(expect_played(&mut events).await, "640x480");

    session.set_resolution(3).await.unwrap();
    // Still running, and Played re-fires with the new dimensions
    assert!(session.is_open().await);
    assert_eq!(expect_played(&mut events).await, "1920x1080");
}

#[tokio::test]
async fn test_unknown_resolution_index_rejected() {
    let (_, session) = standard_session();
    session.initialize(None, None).await.unwrap();

    for index in [0, 4, 6] {
        assert!(matches!(
            session.set_resolution(index).await,
            Err(CamkitError::InvalidArgument { .. })
        ));
    }
}

#[tokio::test]
async fn test_back_only_preset_falls_back_on_front_camera() {
    let (_, session) = standard_session();
    let mut events = session.events().subscribe();

    session
        .initialize(
            Some(CameraFacing::Front),
            Some(ResolutionPreset::Uhd3840x2160),
        )
        .await
        .unwrap();
    session.start().await.unwrap();
    assert_eq!(expect_played(&mut events).await, "1280x720");
}

#[tokio::test]
async fn test_back_only_preset_request_keeps_active_front_preset() {
    let (_, session) = standard_session();
    let mut events = session.events().subscribe();

    session
        .initialize(Some(CameraFacing::Front), Some(ResolutionPreset::Vga640x480))
        .await
        .unwrap();
    session.start().await.unwrap();
    assert_eq!(expect_played(&mut events).await, "640x480");

    // 1080p is unavailable on the front camera; the active preset stays,
    // so no restart and no new Played
    session.set_resolution(3).await.unwrap();
    assert_eq!(session.get_resolution().await.unwrap(), "640x480");
}

#[tokio::test]
async fn test_switch_camera_same_facing_is_noop() {
    let (_, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();

    let before = session.get_selected_camera().await.unwrap();
    session.switch_camera(CameraFacing::Back).await.unwrap();
    let after = session.get_selected_camera().await.unwrap();

    assert_eq!(before.id, after.id);
    assert!(session.is_open().await);
}

#[tokio::test]
async fn test_switch_camera_preserves_run_state_and_resets_orientation() {
    let (_, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();
    session.set_orientation(Orientation::LandscapeLeft);

    session.switch_camera(CameraFacing::Front).await.unwrap();
    assert!(session.is_open().await);
    assert_eq!(
        session.get_selected_camera().await.unwrap().facing,
        CameraFacing::Front
    );
    assert_eq!(session.get_orientation(), Orientation::Portrait);

    // Switching while stopped stays stopped
    session.stop().await.unwrap();
    session.switch_camera(CameraFacing::Back).await.unwrap();
    assert_eq!(session.state().await, SessionState::Stopped);
}

#[tokio::test]
async fn test_snapshot_honors_scan_region() {
    let registry = MockRegistry::new(vec![Arc::new(
        MockCamera::new("back-big", CameraFacing::Back, DeviceClass::WideAngle)
            .with_fps(60)
            .with_frame_dims(1000, 1000),
    )]);
    let (_, session) = session_over(registry);

    session.initialize(None, None).await.unwrap();
    session
        .set_scan_region(Some(ScanRegion {
            top: 10,
            left: 10,
            right: 90,
            bottom: 90,
            measured_by_percentage: true,
        }))
        .await
        .unwrap();
    session.start().await.unwrap();

    let encoded = session.take_snapshot(80).await.unwrap();
    let jpeg = BASE64.decode(encoded).unwrap();
    let image = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((image.width(), image.height()), (800, 800));
}

#[tokio::test]
async fn test_second_snapshot_supersedes_unfulfilled_first() {
    // Slow stream so both requests land between frames
    let registry = MockRegistry::new(vec![Arc::new(
        MockCamera::new("back-slow", CameraFacing::Back, DeviceClass::WideAngle).with_fps(2),
    )]);
    let (_, session) = session_over(registry);
    let session = Arc::new(session);

    session
        .initialize(None, Some(ResolutionPreset::Vga640x480))
        .await
        .unwrap();
    session.start().await.unwrap();
    // Let the immediate first frame pass so the next one is ~500 ms out
    tokio::time::sleep(Duration::from_millis(100)).await;

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.take_snapshot(85).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = session.take_snapshot(85).await;

    // The superseded request errors without ever carrying a payload
    assert!(first.await.unwrap().is_err());
    assert!(!second.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_resolution_and_bitmap_ride_the_stream() {
    let (_, session) = standard_session();
    session
        .initialize(None, Some(ResolutionPreset::Vga640x480))
        .await
        .unwrap();
    session.start().await.unwrap();

    assert_eq!(session.get_resolution().await.unwrap(), "640x480");

    // The capture slot is empty until a frame is explicitly saved
    assert!(matches!(
        session.get_bitmap().await,
        Err(CamkitError::NotInitialized { .. })
    ));

    session.save_frame().await.unwrap();
    let frame = session.get_bitmap().await.unwrap();
    assert_eq!((frame.width(), frame.height()), (640, 480));
}

#[tokio::test]
async fn test_save_frame_stores_cropped_frame_for_get_bitmap() {
    let registry = MockRegistry::new(vec![Arc::new(
        MockCamera::new("back-big", CameraFacing::Back, DeviceClass::WideAngle)
            .with_fps(60)
            .with_frame_dims(1000, 1000),
    )]);
    let (_, session) = session_over(registry);

    session.initialize(None, None).await.unwrap();
    session
        .set_scan_region(Some(ScanRegion {
            top: 10,
            left: 10,
            right: 90,
            bottom: 90,
            measured_by_percentage: true,
        }))
        .await
        .unwrap();
    session.start().await.unwrap();

    session.save_frame().await.unwrap();
    let frame = session.get_bitmap().await.unwrap();
    assert_eq!((frame.width(), frame.height()), (800, 800));
}

#[tokio::test]
async fn test_take_photo_returns_base64_and_restores_modes() {
    let (registry, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();

    let result = session.take_photo(None, true, 90).await.unwrap();
    let jpeg = BASE64.decode(result.base64.unwrap()).unwrap();
    let image = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((image.width(), image.height()), (1920, 1080));

    // Both adjustments were locked to single-shot for the capture and are
    // restored together after the grace delay
    let device = registry.device("back-triple").unwrap();
    assert_eq!(device.focus_mode(), crate::device::FocusMode::SinglePointAuto);
    assert_eq!(device.exposure_mode(), ExposureMode::SinglePointAuto);
    tokio::time::sleep(Duration::from_millis(
        CamkitConfig::default().photo.restore_ms + 200,
    ))
    .await;
    assert_eq!(
        device.focus_mode(),
        crate::device::FocusMode::ContinuousAuto
    );
    assert_eq!(device.exposure_mode(), ExposureMode::ContinuousAuto);

    std::fs::remove_file(&result.path).unwrap();
}

#[tokio::test]
async fn test_take_photo_without_path_writes_generated_temp_file() {
    let (_, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();

    let result = session.take_photo(None, false, 85).await.unwrap();
    assert!(result.base64.is_none());
    assert_eq!(result.path.extension().unwrap(), "jpg");

    let bytes = std::fs::read(&result.path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    std::fs::remove_file(&result.path).unwrap();
}

#[tokio::test]
async fn test_take_photo_writes_to_requested_path() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("photo.jpg");

    let (_, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();

    let result = session
        .take_photo(Some(target.clone()), false, 85)
        .await
        .unwrap();
    assert_eq!(result.path, target);

    let bytes = std::fs::read(&target).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_take_photo_proceeds_when_focus_lock_fails() {
    let (registry, session) = standard_session();
    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();

    registry
        .device("back-triple")
        .unwrap()
        .set_focus_config_failure(true);

    let result = session.take_photo(None, true, 90).await.unwrap();
    assert!(result.base64.is_some());
    std::fs::remove_file(&result.path).unwrap();
}

#[tokio::test]
async fn test_zoom_clamps_to_device_range() {
    let (registry, session) = standard_session();
    session.initialize(None, None).await.unwrap();

    session.set_zoom(100.0).await.unwrap();
    let device = registry.device("back-triple").unwrap();
    assert_eq!(device.zoom(), 8.0);

    session.set_zoom(0.1).await.unwrap();
    assert_eq!(device.zoom(), 1.0);
}

#[tokio::test]
async fn test_torch_is_noop_without_hardware() {
    let registry = MockRegistry::new(vec![Arc::new(
        MockCamera::new("back-plain", CameraFacing::Back, DeviceClass::WideAngle).with_caps(
            MockCaps {
                torch: false,
                ..MockCaps::default()
            },
        ),
    )]);
    let (registry, session) = session_over(registry);
    session.initialize(None, None).await.unwrap();

    session.toggle_torch(true).await.unwrap();
    assert!(!session.torch_on().await);
    assert!(!registry.device("back-plain").unwrap().torch_on());
}

#[tokio::test]
async fn test_recording_produces_stream_file_and_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mjpeg");

    let (_, session) = standard_session();
    session
        .initialize(None, Some(ResolutionPreset::Vga640x480))
        .await
        .unwrap();
    session.start().await.unwrap();

    session
        .start_recording(Some(path.clone()), false)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let result = session.stop_recording(false).await.unwrap();

    assert_eq!(result.path, path);
    assert!(result.base64.is_none());
    assert!(!session.audio_enabled().await);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
    // The stream survives the recorder teardown
    assert!(session.is_open().await);

    assert!(matches!(
        session.stop_recording(false).await,
        Err(CamkitError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn test_stop_drops_pending_tickets() {
    let registry = MockRegistry::new(vec![Arc::new(
        MockCamera::new("back-slow", CameraFacing::Back, DeviceClass::WideAngle).with_fps(2),
    )]);
    let (_, session) = session_over(registry);
    let session = Arc::new(session);

    session.initialize(None, None).await.unwrap();
    session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.take_snapshot(85).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.stop().await.unwrap();

    assert!(pending.await.unwrap().is_err());
    assert_eq!(session.state().await, SessionState::Stopped);
}

#[tokio::test]
async fn test_orientation_change_is_published() {
    let (_, session) = standard_session();
    let mut events = session.events().subscribe();

    session.set_orientation(Orientation::LandscapeRight);
    match events.recv().await.unwrap() {
        CameraEvent::OrientationChanged { orientation } => {
            assert_eq!(orientation, Orientation::LandscapeRight);
            assert_eq!(orientation.label(), "LANDSCAPE");
        }
        other => panic!("Unexpected event: {:?}", other),
    }
    assert_eq!(session.get_orientation(), Orientation::LandscapeRight);
}

#[tokio::test]
async fn test_layout_rejects_malformed_values() {
    let (_, session) = standard_session();

    let result = session
        .set_layout("0", "0", "nonsense", "100%", 360.0, 640.0)
        .await;
    assert!(matches!(result, Err(CamkitError::InvalidArgument { .. })));
    assert!(session.layout().await.is_none());

    let layout = session
        .set_layout("0", "10%", "100%", "480px", 360.0, 640.0)
        .await
        .unwrap();
    assert_eq!(layout.width, 360.0);
    assert_eq!(session.layout().await, Some(layout));
}

#[tokio::test]
async fn test_get_all_cameras_lists_registry() {
    let (_, session) = standard_session();
    let cameras = session.get_all_cameras();
    assert_eq!(cameras.len(), 3);
    assert!(cameras.iter().any(|c| c.facing == CameraFacing::Front));
}
