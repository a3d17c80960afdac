//! Camera capture session toolkit: device selection, a serialized capture
//! session with one-shot capture tickets, tap-to-focus control, frame output
//! processing and blur classification.
//!
//! The [`session::CaptureSession`] aggregate drives everything; hardware is
//! abstracted behind [`device::CameraDevice`], with an in-process mock for
//! tests and headless use and an optional GStreamer backend on Linux.

pub mod blur;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod focus;
pub mod frame;
pub mod layout;
pub mod permissions;
pub mod session;

pub use config::CamkitConfig;
pub use error::{CamkitError, Result};
pub use session::CaptureSession;
