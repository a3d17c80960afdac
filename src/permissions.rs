use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Authorization state of a capture-related permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

impl PermissionStatus {
    /// Denied and restricted are terminal; the session never retries them
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, PermissionStatus::Denied | PermissionStatus::Restricted)
    }
}

/// Result payload of a permission request, as returned to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub granted: bool,
}

/// Platform seam for permission state and prompts. The prompt UI itself is
/// outside this crate; implementations bridge to the platform's dialogs.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    fn camera_status(&self) -> PermissionStatus;

    async fn request_camera(&self) -> PermissionGrant;

    async fn request_microphone(&self) -> PermissionGrant;
}

/// Fixed-outcome provider for tests and headless use
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    camera: PermissionStatus,
    microphone: PermissionStatus,
}

impl StaticPermissions {
    pub fn granted() -> Self {
        Self {
            camera: PermissionStatus::Authorized,
            microphone: PermissionStatus::Authorized,
        }
    }

    pub fn denied() -> Self {
        Self {
            camera: PermissionStatus::Denied,
            microphone: PermissionStatus::Denied,
        }
    }

    pub fn undetermined_then_granted() -> Self {
        Self {
            camera: PermissionStatus::NotDetermined,
            microphone: PermissionStatus::NotDetermined,
        }
    }

    pub fn with_camera(mut self, status: PermissionStatus) -> Self {
        self.camera = status;
        self
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    fn camera_status(&self) -> PermissionStatus {
        self.camera
    }

    async fn request_camera(&self) -> PermissionGrant {
        PermissionGrant {
            granted: !self.camera.is_terminal_failure(),
        }
    }

    async fn request_microphone(&self) -> PermissionGrant {
        PermissionGrant {
            granted: !self.microphone.is_terminal_failure(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PermissionStatus::Denied.is_terminal_failure());
        assert!(PermissionStatus::Restricted.is_terminal_failure());
        assert!(!PermissionStatus::Authorized.is_terminal_failure());
        assert!(!PermissionStatus::NotDetermined.is_terminal_failure());
    }

    #[tokio::test]
    async fn test_static_provider_outcomes() {
        let granted = StaticPermissions::granted();
        assert!(granted.request_camera().await.granted);

        let denied = StaticPermissions::denied();
        assert!(!denied.request_camera().await.granted);
        assert!(!denied.request_microphone().await.granted);
    }
}
