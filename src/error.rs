use crate::device::CameraFacing;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamkitError {
    /// Camera or microphone access was denied or restricted. Terminal: the
    /// session never retries permission on its own.
    #[error("Permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("No camera device found for {facing:?} facing")]
    DeviceNotFound { facing: CameraFacing },

    #[error("Session not initialized: {details}")]
    NotInitialized { details: String },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    /// Locking or configuring the device failed. Call sites log and swallow
    /// this for best-effort adjustments (torch, zoom, focus).
    #[error("Hardware configuration failed: {details}")]
    HardwareConfiguration { details: String },

    /// Image crop/encode failed. Surfaced as a rejection of the specific
    /// pending ticket that requested the output.
    #[error("Encoding failed: {details}")]
    Encoding { details: String },

    /// Classifier load or inference failure. Never surfaced to callers; the
    /// blur engine falls back to the deterministic tier instead.
    #[error("Classifier error: {details}")]
    Classifier { details: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),
}

impl CamkitError {
    pub fn permission_denied<S: Into<String>>(details: S) -> Self {
        Self::PermissionDenied {
            details: details.into(),
        }
    }

    pub fn not_initialized<S: Into<String>>(details: S) -> Self {
        Self::NotInitialized {
            details: details.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(details: S) -> Self {
        Self::InvalidArgument {
            details: details.into(),
        }
    }

    pub fn hardware<S: Into<String>>(details: S) -> Self {
        Self::HardwareConfiguration {
            details: details.into(),
        }
    }

    pub fn encoding<S: Into<String>>(details: S) -> Self {
        Self::Encoding {
            details: details.into(),
        }
    }

    pub fn classifier<S: Into<String>>(details: S) -> Self {
        Self::Classifier {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CamkitError>;
