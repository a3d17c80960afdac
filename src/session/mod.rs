mod graph;
mod orchestrator;
mod recording;
mod tickets;

#[cfg(test)]
mod tests;

pub use orchestrator::{CaptureSession, PhotoResult, SessionState};
pub use recording::{MovieWriter, RecordingResult};
