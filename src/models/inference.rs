//! Prediction service: one normalized record in, one verdict out

use crate::config::AppConfig;
use crate::error::{ArtifactLoadError, InvocationError, ServingError};
use crate::models::loader::ModelLoader;
use crate::models::pipeline::ModelPipeline;
use crate::normalizer::FeatureNormalizer;
use crate::types::prediction::{Confidence, PredictionResult, Verdict};
use crate::types::record::{NormalizedRecord, RawRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the shared pipeline on single records.
///
/// Holds no per-request state; clone the `Arc` around it to share it between
/// tasks.
pub struct PredictionService {
    pipeline: Arc<dyn ModelPipeline>,
    normalizer: FeatureNormalizer,
    report_confidence: bool,
}

impl PredictionService {
    /// Create a service over an already loaded pipeline
    pub fn new(pipeline: Arc<dyn ModelPipeline>) -> Self {
        Self {
            pipeline,
            normalizer: FeatureNormalizer::new(),
            report_confidence: true,
        }
    }

    /// Load the configured artifact through `loader` and build the service
    pub fn from_config(config: &AppConfig, loader: &ModelLoader) -> Result<Self, ArtifactLoadError> {
        let pipeline = loader.load(&config.model.artifact_path)?;
        let service = Self::new(pipeline).with_confidence(config.model.report_confidence);

        info!(
            model = %service.pipeline.name(),
            features = service.pipeline.n_features(),
            confidence = service.reports_confidence(),
            "Prediction service initialized"
        );
        Ok(service)
    }

    /// Enable or suppress confidence reporting
    pub fn with_confidence(mut self, enabled: bool) -> Self {
        self.report_confidence = enabled;
        self
    }

    /// Whether replies will carry class percentages
    pub fn reports_confidence(&self) -> bool {
        self.report_confidence && self.pipeline.supports_proba()
    }

    pub fn pipeline(&self) -> &Arc<dyn ModelPipeline> {
        &self.pipeline
    }

    pub fn normalizer(&self) -> &FeatureNormalizer {
        &self.normalizer
    }

    /// Predict on one normalized record.
    ///
    /// Errors are returned as-is; there is no fallback verdict.
    pub fn predict(&self, record: &NormalizedRecord) -> Result<PredictionResult, InvocationError> {
        let row = record.as_slice();
        let expected = self.pipeline.n_features();
        if row.len() != expected {
            return Err(InvocationError::Shape {
                expected,
                got: row.len(),
            });
        }
        let batch = [row];

        let code = match self.pipeline.predict(&batch)?.as_slice() {
            [code] => *code,
            other => {
                return Err(InvocationError::Output(format!(
                    "expected one prediction, got {}",
                    other.len()
                )))
            }
        };
        let verdict = Verdict::from_code(code);

        let confidence = if self.reports_confidence() {
            let rows = self.pipeline.predict_proba(&batch)?;
            match rows.as_slice() {
                [probabilities] => Some(Confidence::from_row(self.pipeline.classes(), probabilities)?),
                other => {
                    return Err(InvocationError::Output(format!(
                        "expected one probability row, got {}",
                        other.len()
                    )))
                }
            }
        } else {
            None
        };

        debug!(
            code = code,
            verdict = %verdict,
            confidence = ?confidence,
            "Prediction complete"
        );

        Ok(PredictionResult {
            verdict,
            confidence,
        })
    }

    /// Normalize then predict
    pub fn evaluate(&self, raw: &RawRecord) -> Result<PredictionResult, ServingError> {
        let record = self.normalizer.normalize(raw)?;
        Ok(self.predict(&record)?)
    }
}
