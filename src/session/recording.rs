use crate::error::{CamkitError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Completed recording handed back to the caller
#[derive(Debug, Clone)]
pub struct RecordingResult {
    pub path: PathBuf,
    /// Base64 of the whole stream file, when the caller asked for it
    pub base64: Option<String>,
}

/// Appends encoded frames to an MJPEG stream file while a recording is
/// active. Concatenated JPEG images are a valid MJPEG stream; no container
/// muxing is involved.
pub struct MovieWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl MovieWriter {
    /// Open a writer at the given path, or a uuid-named file in the system
    /// temp directory when none is supplied.
    pub fn create(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::temp_dir().join(format!(
                "{}_{}.mjpeg",
                Local::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4()
            )),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&path)?);
        info!("Recording to {}", path.display());
        Ok(Self {
            path,
            writer,
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn append(&mut self, jpeg: &[u8]) -> Result<()> {
        self.writer
            .write_all(jpeg)
            .map_err(|e| CamkitError::encoding(format!("recording append failed: {}", e)))?;
        self.frames += 1;
        Ok(())
    }

    /// Flush and close the stream file
    pub fn finish(mut self, include_base64: bool) -> Result<RecordingResult> {
        self.writer
            .flush()
            .map_err(|e| CamkitError::encoding(format!("recording flush failed: {}", e)))?;
        drop(self.writer);

        debug!("Recording finished: {} frames at {}", self.frames, self.path.display());
        let base64 = if include_base64 {
            Some(BASE64.encode(std::fs::read(&self.path)?))
        } else {
            None
        };
        Ok(RecordingResult {
            path: self.path,
            base64,
        })
    }
}
