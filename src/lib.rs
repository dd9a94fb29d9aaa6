//! Heart Risk Serving Library
//!
//! Turns a patient's answers into the canonical 13-feature vector, runs a
//! trust-negotiated model pipeline on it, and reports a verdict with
//! optional class percentages.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod producer;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactLoadError, InvocationError, NormalizeError, ServingError};
pub use models::inference::PredictionService;
pub use models::loader::ModelLoader;
pub use normalizer::FeatureNormalizer;
pub use producer::ReplyProducer;
pub use schema::form::FormManifest;
pub use types::{PredictionResponse, PredictionResult, RawRecord, Verdict};
