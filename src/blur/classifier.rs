use crate::error::Result;
use image::imageops::FilterType;
use image::RgbaImage;

/// Outcome of a blur evaluation, with the signal that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurVerdict {
    pub blurry: bool,
    pub signals: BlurSignals,
}

/// Which tier decided, and the raw numbers it saw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlurSignals {
    /// Learned two-class model output
    Classifier {
        blur_confidence: f32,
        sharp_confidence: f32,
    },
    /// Edge-energy estimator output
    EdgeEnergy { score: f64 },
}

/// A learned two-class blur model.
///
/// Implementations wrap whatever inference backend hosts the model; the
/// engine only needs a square input edge length and a `(blur, sharp)`
/// confidence pair per run. Any error from `run` is treated as a soft
/// failure and routed to the fallback estimator.
pub trait BlurClassifier: Send + Sync {
    /// Edge length of the square input the model expects
    fn input_size(&self) -> u32;

    /// Run inference over a preprocessed input, returning
    /// `(blur_confidence, sharp_confidence)` in [0, 1]
    fn run(&self, input: &[f32]) -> Result<(f32, f32)>;
}

/// Resize to the model's square input and scale channels to [0, 1],
/// interleaved RGB. Alpha is dropped.
pub fn preprocess(image: &RgbaImage, input_size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(image, input_size, input_size, FilterType::Triangle);
    let mut input = Vec::with_capacity((input_size * input_size * 3) as usize);
    for px in resized.pixels() {
        input.push(px.0[0] as f32 / 255.0);
        input.push(px.0[1] as f32 / 255.0);
        input.push(px.0[2] as f32 / 255.0);
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_shape_and_range() {
        let image = RgbaImage::from_pixel(64, 48, image::Rgba([255, 128, 0, 255]));
        let input = preprocess(&image, 32);
        assert_eq!(input.len(), 32 * 32 * 3);
        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((input[0] - 1.0).abs() < 1e-6);
    }
}
