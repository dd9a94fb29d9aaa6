//! ONNX Runtime backed estimator
//!
//! Handles both output layouts sklearn-onnx produces for classifiers: a
//! `[batch, n_classes]` probability tensor, or a `seq(map(int64, float))`
//! ("ZipMap") output.

use crate::error::{ArtifactLoadError, InvocationError};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// ONNX classifier with its session and I/O names
pub struct OnnxClassifier {
    /// Sessions need exclusive access to run
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    classes: Vec<i64>,
    n_features: usize,
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("classes", &self.classes)
            .finish()
    }
}

fn runtime_error(path: &Path, e: impl fmt::Display) -> ArtifactLoadError {
    ArtifactLoadError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

impl OnnxClassifier {
    /// Load an ONNX graph from file
    pub fn load(
        path: &Path,
        classes: Vec<i64>,
        n_features: usize,
        threads: usize,
    ) -> Result<Self, ArtifactLoadError> {
        if !path.exists() {
            return Err(ArtifactLoadError::NotFound(path.to_path_buf()));
        }
        if classes.is_empty() {
            return Err(runtime_error(path, "ONNX step declares no classes"));
        }

        info!(path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| runtime_error(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "output_probability".to_string())
            });

        info!(
            input = %input_name,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            classes,
            n_features,
        })
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Class probabilities for one row, in `classes` order
    pub fn proba(&self, row: &[f64]) -> Result<Vec<f64>, InvocationError> {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let shape = vec![1_i64, self.n_features as i64];
        let input_tensor = Tensor::from_array((shape, features))
            .map_err(|e| InvocationError::Runtime(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InvocationError::Runtime("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| InvocationError::Runtime(e.to_string()))?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            InvocationError::Output(format!("missing output `{}`", self.output_name))
        })?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let width = dims.last().copied().unwrap_or(0) as usize;
            if width != self.classes.len() || data.len() < width {
                return Err(InvocationError::Output(format!(
                    "probability tensor {:?} for {} classes",
                    dims,
                    self.classes.len()
                )));
            }
            debug!(output = %self.output_name, "Extracted from tensor");
            return Ok(data[..width].iter().map(|&p| p as f64).collect());
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.extract_from_sequence_map(&output);
        }

        Err(InvocationError::Output(format!(
            "unsupported output type for `{}`",
            self.output_name
        )))
    }

    /// Read the first `map(int64, float)` of a ZipMap output
    fn extract_from_sequence_map(
        &self,
        output: &ort::value::DynValue,
    ) -> Result<Vec<f64>, InvocationError> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| InvocationError::Output(e.to_string()))?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| InvocationError::Output(e.to_string()))?;
        let first = maps
            .first()
            .ok_or_else(|| InvocationError::Output("empty sequence".to_string()))?;
        let pairs = first
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| InvocationError::Output(e.to_string()))?;

        self.classes
            .iter()
            .map(|class| {
                pairs
                    .iter()
                    .find(|(key, _)| key == class)
                    .map(|(_, p)| *p as f64)
                    .ok_or_else(|| {
                        InvocationError::Output(format!("no probability for class {}", class))
                    })
            })
            .collect()
    }
}
