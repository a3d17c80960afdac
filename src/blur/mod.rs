mod classifier;
mod engine;
mod laplacian;

pub use classifier::{preprocess, BlurClassifier, BlurSignals, BlurVerdict};
pub use engine::BlurEngine;
pub use laplacian::edge_energy_score;
