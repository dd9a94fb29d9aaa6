//! Model artifact loading and inference components

pub mod artifact;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod fixtures;

pub use artifact::TrustedTypes;
pub use inference::PredictionService;
pub use loader::{ModelLoader, TrustPolicy};
pub use pipeline::{ModelPipeline, NativePipeline};
