use crate::device::{CameraFacing, ResolutionPreset};
use crate::error::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CamkitConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub photo: PhotoConfig,
    #[serde(default)]
    pub blur: BlurConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Facing direction bound on first initialization
    #[serde(default = "default_facing")]
    pub default_facing: CameraFacing,

    /// Resolution preset applied on first initialization
    #[serde(default = "default_resolution")]
    pub default_resolution: ResolutionPreset,

    /// Frame rate used by the synthetic mock stream
    #[serde(default = "default_mock_fps")]
    pub mock_fps: u32,
}

/// Timing windows around point-of-interest focus. These are empirical
/// constants tuned per hardware generation, kept in configuration so they can
/// be retuned without code changes.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusConfig {
    /// Minimum spacing between accepted point-of-interest requests
    #[serde(default = "default_focus_throttle_ms")]
    pub throttle_ms: u64,

    /// Settle window after which focus/exposure revert to continuous mode
    #[serde(default = "default_focus_settle_ms")]
    pub settle_ms: u64,

    /// Window after which any pending visual indicator must be cleared
    #[serde(default = "default_focus_indicator_ms")]
    pub indicator_ms: u64,
}

/// Delays around the dedicated still-photo capture's focus lock.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PhotoConfig {
    /// Wait after switching to single-shot AF/AE before capturing
    #[serde(default = "default_photo_settle_ms")]
    pub settle_ms: u64,

    /// Wait after capture before restoring the prior focus/exposure mode
    #[serde(default = "default_photo_restore_ms")]
    pub restore_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BlurConfig {
    /// Classifier tier: blurry when blur confidence reaches this value
    #[serde(default = "default_blur_confidence_min")]
    pub blur_confidence_min: f32,

    /// Classifier tier: blurry when sharp confidence falls below this value
    #[serde(default = "default_sharp_confidence_floor")]
    pub sharp_confidence_floor: f32,

    /// Fallback tier: blurry when the Laplacian variance score is below this
    #[serde(default = "default_laplacian_threshold")]
    pub laplacian_threshold: f64,

    /// Sampling stride for the fallback estimator (bounds cost on large images)
    #[serde(default = "default_sample_step")]
    pub sample_step: u32,
}

fn default_facing() -> CameraFacing {
    CameraFacing::Back
}

fn default_resolution() -> ResolutionPreset {
    ResolutionPreset::Hd1280x720
}

fn default_mock_fps() -> u32 {
    30
}

fn default_focus_throttle_ms() -> u64 {
    500
}

fn default_focus_settle_ms() -> u64 {
    1500
}

fn default_focus_indicator_ms() -> u64 {
    2000
}

fn default_photo_settle_ms() -> u64 {
    300
}

fn default_photo_restore_ms() -> u64 {
    800
}

fn default_blur_confidence_min() -> f32 {
    0.99
}

fn default_sharp_confidence_floor() -> f32 {
    0.1
}

fn default_laplacian_threshold() -> f64 {
    150.0
}

fn default_sample_step() -> u32 {
    4
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_facing: default_facing(),
            default_resolution: default_resolution(),
            mock_fps: default_mock_fps(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_focus_throttle_ms(),
            settle_ms: default_focus_settle_ms(),
            indicator_ms: default_focus_indicator_ms(),
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_photo_settle_ms(),
            restore_ms: default_photo_restore_ms(),
        }
    }
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            blur_confidence_min: default_blur_confidence_min(),
            sharp_confidence_floor: default_sharp_confidence_floor(),
            laplacian_threshold: default_laplacian_threshold(),
            sample_step: default_sample_step(),
        }
    }
}

impl CamkitConfig {
    /// Load configuration from a TOML file with CAMKIT_* environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("CAMKIT").separator("_"))
            .build()?;

        let config: CamkitConfig = settings.try_deserialize()?;
        config.validate()?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        use crate::error::CamkitError;

        if self.session.mock_fps == 0 {
            return Err(CamkitError::invalid_argument("mock_fps must be non-zero"));
        }
        if self.blur.sample_step == 0 {
            return Err(CamkitError::invalid_argument(
                "blur.sample_step must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.blur.blur_confidence_min)
            || !(0.0..=1.0).contains(&self.blur.sharp_confidence_floor)
        {
            return Err(CamkitError::invalid_argument(
                "blur confidence thresholds must be within [0, 1]",
            ));
        }
        if self.blur.laplacian_threshold < 0.0 {
            return Err(CamkitError::invalid_argument(
                "blur.laplacian_threshold must be non-negative",
            ));
        }
        Ok(())
    }
}
