use super::recording::MovieWriter;
use super::tickets::{PendingTickets, TicketBoard};
use crate::device::{CameraDevice, ResolutionPreset};
use crate::error::{CamkitError, Result};
use crate::events::{CameraEvent, EventBus};
use crate::frame::{FrameData, FramePipeline, Orientation, ScanRegion};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// JPEG quality used for recorded frames
const RECORDING_QUALITY: u8 = 85;

/// State shared between the session surface and the frame delivery task.
/// The delivery task only ever reads device state and fulfills tickets; all
/// mode mutation happens on the session side.
pub(crate) struct SharedFrameState {
    /// Single slot holding the frame most recently stored by a save-frame
    /// ticket, already normalized and cropped. Each capture replaces it.
    pub captured: Mutex<Option<image::RgbaImage>>,
    pub orientation: Mutex<Orientation>,
    pub scan_region: Mutex<Option<ScanRegion>>,
    pub tickets: Mutex<TicketBoard>,
    pub recorder: Mutex<Option<MovieWriter>>,
}

impl SharedFrameState {
    pub fn new() -> Self {
        Self {
            captured: Mutex::new(None),
            orientation: Mutex::new(Orientation::Portrait),
            scan_region: Mutex::new(None),
            tickets: Mutex::new(TicketBoard::default()),
            recorder: Mutex::new(None),
        }
    }
}

/// A live capture graph: the bound device's frame stream plus the delivery
/// task draining it. Built and torn down as a unit; every reconfiguration
/// that touches the stream goes through a teardown and rebuild.
pub(crate) struct DeviceGraph {
    device: Arc<dyn CameraDevice>,
    frame_task: tokio::task::JoinHandle<()>,
}

impl DeviceGraph {
    pub async fn build(
        device: Arc<dyn CameraDevice>,
        preset: ResolutionPreset,
        shared: Arc<SharedFrameState>,
        events: EventBus,
    ) -> Result<Self> {
        let rx = device.start_stream(preset).await?;
        info!(
            "Capture graph built on '{}' at {:?}",
            device.info().id,
            preset
        );
        let frame_task = tokio::spawn(deliver_frames(rx, shared, events));
        Ok(Self { device, frame_task })
    }

    /// Stop the stream, kill the delivery task and drop everything pending
    pub async fn teardown(self, shared: &SharedFrameState) {
        if let Err(e) = self.device.stop_stream().await {
            error!("Error stopping stream: {}", e);
        }
        self.frame_task.abort();
        shared.tickets.lock().clear();
        debug!("Capture graph torn down");
    }
}

async fn deliver_frames(
    mut rx: mpsc::Receiver<FrameData>,
    shared: Arc<SharedFrameState>,
    events: EventBus,
) {
    let mut played = false;
    while let Some(mut frame) = rx.recv().await {
        frame.orientation = *shared.orientation.lock();

        if !played {
            played = true;
            events.publish(CameraEvent::Played {
                resolution: frame.resolution_string(),
            });
        }

        let pending = shared.tickets.lock().drain();
        let recording = shared.recorder.lock().is_some();
        if !pending.is_empty() || recording {
            fulfill(&frame, pending, &shared);
        }
    }
    debug!("Frame delivery ended");
}

/// Resolve all pending tickets (and the recorder, if any) against one frame
fn fulfill(frame: &FrameData, pending: PendingTickets, shared: &SharedFrameState) {
    if let Some(ticket) = pending.resolution_probe {
        let _ = ticket.reply.send(frame.resolution_string());
    }

    let needs_image = pending.snapshot.is_some()
        || pending.save_frame.is_some()
        || shared.recorder.lock().is_some();
    if !needs_image {
        return;
    }

    let region = *shared.scan_region.lock();
    let image = match FramePipeline::process(frame, region.as_ref()) {
        Ok(image) => image,
        Err(e) => {
            // The tickets riding this frame are rejected; the stream goes on
            error!("Frame processing failed: {}", e);
            let details = e.to_string();
            if let Some(ticket) = pending.snapshot {
                let _ = ticket.reply.send(Err(CamkitError::encoding(&details)));
            }
            if let Some(ticket) = pending.save_frame {
                let _ = ticket.reply.send(Err(CamkitError::encoding(&details)));
            }
            return;
        }
    };

    if let Some(ticket) = pending.snapshot {
        let _ = ticket
            .reply
            .send(FramePipeline::to_base64_jpeg(&image, ticket.quality));
    }

    if let Some(ticket) = pending.save_frame {
        *shared.captured.lock() = Some(image.clone());
        let _ = ticket.reply.send(Ok(()));
    }

    if let Some(recorder) = shared.recorder.lock().as_mut() {
        match FramePipeline::encode_jpeg(&image, RECORDING_QUALITY) {
            Ok(jpeg) => {
                if let Err(e) = recorder.append(&jpeg) {
                    error!("Dropping recorded frame: {}", e);
                }
            }
            Err(e) => error!("Could not encode recorded frame: {}", e),
        }
    }
}
