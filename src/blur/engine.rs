use super::classifier::{preprocess, BlurClassifier, BlurSignals, BlurVerdict};
use super::laplacian::edge_energy_score;
use crate::config::BlurConfig;
use crate::error::Result;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Two-tier blur evaluation.
///
/// When a learned classifier is loaded it decides: blurry iff the blur
/// confidence reaches the configured minimum or the sharp confidence falls
/// below the floor. Without one, or whenever inference fails, the edge-energy
/// estimator decides against its own threshold. Evaluation never fails;
/// classifier errors are logged and absorbed by the fallback.
pub struct BlurEngine {
    classifier: Mutex<Option<Arc<dyn BlurClassifier>>>,
    config: BlurConfig,
}

impl BlurEngine {
    pub fn new(config: BlurConfig) -> Self {
        Self {
            classifier: Mutex::new(None),
            config,
        }
    }

    /// Try to load a classifier. Returns whether the learned tier is active;
    /// a loader failure leaves the engine on the fallback tier.
    pub fn initialize<F>(&self, loader: F) -> bool
    where
        F: FnOnce() -> Result<Arc<dyn BlurClassifier>>,
    {
        match loader() {
            Ok(classifier) => {
                info!(
                    "Blur classifier loaded (input {}px)",
                    classifier.input_size()
                );
                *self.classifier.lock() = Some(classifier);
                true
            }
            Err(e) => {
                warn!("Blur classifier unavailable, using edge-energy fallback: {}", e);
                false
            }
        }
    }

    /// Release the classifier; subsequent evaluations use the fallback
    pub fn close(&self) {
        if self.classifier.lock().take().is_some() {
            debug!("Blur classifier released");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.classifier.lock().is_some()
    }

    pub fn classify(&self, image: &RgbaImage) -> BlurVerdict {
        let classifier = self.classifier.lock().clone();
        if let Some(classifier) = classifier {
            let input = preprocess(image, classifier.input_size());
            match classifier.run(&input) {
                Ok((blur_confidence, sharp_confidence)) => {
                    let blurry = blur_confidence >= self.config.blur_confidence_min
                        || sharp_confidence < self.config.sharp_confidence_floor;
                    return BlurVerdict {
                        blurry,
                        signals: BlurSignals::Classifier {
                            blur_confidence,
                            sharp_confidence,
                        },
                    };
                }
                Err(e) => {
                    warn!("Blur inference failed, falling back to edge energy: {}", e);
                }
            }
        }

        let score = edge_energy_score(image, self.config.sample_step);
        BlurVerdict {
            blurry: score < self.config.laplacian_threshold,
            signals: BlurSignals::EdgeEnergy { score },
        }
    }
}
