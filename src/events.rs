use crate::frame::Orientation;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Asynchronous notifications delivered to the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CameraEvent {
    /// The stream is playing; fires once the first frame is observed after a
    /// start or restart. Carries the observed "WxH" resolution.
    Played { resolution: String },
    /// The device orientation changed
    OrientationChanged { orientation: Orientation },
}

impl CameraEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CameraEvent::Played { .. } => "onPlayed",
            CameraEvent::OrientationChanged { .. } => "onOrientationChanged",
        }
    }
}

/// Broadcast bus carrying session notifications to any number of listeners.
/// Slow listeners lag rather than block frame delivery.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CameraEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: CameraEvent) {
        debug!("Publishing event: {}", event.event_type());
        // A send error just means nobody is listening right now
        let _ = self.sender.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(CameraEvent::Played {
            resolution: "1280x720".to_string(),
        });

        match rx.recv().await.unwrap() {
            CameraEvent::Played { resolution } => assert_eq!(resolution, "1280x720"),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_listeners_is_harmless() {
        let bus = EventBus::new(8);
        bus.publish(CameraEvent::OrientationChanged {
            orientation: Orientation::LandscapeLeft,
        });
        assert_eq!(bus.listener_count(), 0);
    }
}
