//! Model artifact format and trust-scoped decoding.
//!
//! An artifact is a JSON envelope: a header (format version, feature order,
//! declared required types) and a list of typed steps. Step payloads are
//! decoded only after every step type has been granted by the caller.

use super::pipeline::{
    DecisionTreeClassifier, Estimator, LogisticRegression, NativePipeline,
    RandomForestClassifier, StandardScaler,
};
use crate::error::ArtifactLoadError;
use crate::schema;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Envelope version this build understands.
pub const FORMAT_VERSION: u32 = 1;

pub const STANDARD_SCALER: &str = "preprocessing.StandardScaler";
pub const LOGISTIC_REGRESSION: &str = "linear_model.LogisticRegression";
pub const DECISION_TREE: &str = "tree.DecisionTreeClassifier";
pub const RANDOM_FOREST: &str = "ensemble.RandomForestClassifier";
pub const ONNX_SESSION: &str = "onnx.InferenceSession";

/// Step types evaluated in-process from plain numeric data.
pub const NATIVE_TYPES: [&str; 4] = [STANDARD_SCALER, LOGISTIC_REGRESSION, DECISION_TREE, RANDOM_FOREST];

/// Set of step types a load is allowed to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedTypes(BTreeSet<String>);

impl TrustedTypes {
    /// Grant nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.0.contains(type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TrustedTypes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Knobs that do not affect trust.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Intra-op threads for ONNX sessions.
    pub onnx_threads: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    format_version: u32,
    #[serde(default)]
    name: Option<String>,
    feature_names: Vec<String>,
    required_types: Vec<String>,
    steps: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StepSpec {
    #[serde(rename = "preprocessing.StandardScaler")]
    StandardScaler(StandardScaler),
    #[serde(rename = "linear_model.LogisticRegression")]
    LogisticRegression(LogisticRegression),
    #[serde(rename = "tree.DecisionTreeClassifier")]
    DecisionTree(DecisionTreeClassifier),
    #[serde(rename = "ensemble.RandomForestClassifier")]
    RandomForest(RandomForestClassifier),
    #[serde(rename = "onnx.InferenceSession")]
    OnnxSession(OnnxStep),
}

/// ONNX graph stored next to the artifact.
#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
struct OnnxStep {
    path: PathBuf,
    classes: Vec<i64>,
}

fn corrupt(path: &Path, reason: impl Into<String>) -> ArtifactLoadError {
    ArtifactLoadError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_envelope(path: &Path) -> Result<Envelope, ArtifactLoadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactLoadError::NotFound(path.to_path_buf())
        } else {
            ArtifactLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let envelope: Envelope =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(path, e.to_string()))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(ArtifactLoadError::UnsupportedVersion {
            found: envelope.format_version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(envelope)
}

/// Types the artifact declares it needs, sorted and deduplicated.
///
/// Reads only the header; no step payload is decoded.
pub fn declared_types<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ArtifactLoadError> {
    let envelope = read_envelope(path.as_ref())?;
    let types: BTreeSet<String> = envelope.required_types.into_iter().collect();
    Ok(types.into_iter().collect())
}

/// Load with exactly `trusted` granted and default options.
pub fn load<P: AsRef<Path>>(
    path: P,
    trusted: &TrustedTypes,
) -> Result<NativePipeline, ArtifactLoadError> {
    load_with(path, trusted, &LoadOptions::default())
}

/// Load with exactly `trusted` granted.
///
/// Fails with [`ArtifactLoadError::Untrusted`] listing every step type the
/// grant does not cover, before any step payload is decoded.
pub fn load_with<P: AsRef<Path>>(
    path: P,
    trusted: &TrustedTypes,
    options: &LoadOptions,
) -> Result<NativePipeline, ArtifactLoadError> {
    let path = path.as_ref();
    let envelope = read_envelope(path)?;

    let mut step_types = Vec::with_capacity(envelope.steps.len());
    for (idx, step) in envelope.steps.iter().enumerate() {
        let type_name = step
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| corrupt(path, format!("step {} has no type tag", idx)))?;
        step_types.push(type_name.to_string());
    }

    if let Some(undeclared) = step_types
        .iter()
        .find(|t| !envelope.required_types.contains(t))
    {
        return Err(corrupt(
            path,
            format!("step type `{}` is used but not declared", undeclared),
        ));
    }

    let untrusted: BTreeSet<&str> = step_types
        .iter()
        .map(String::as_str)
        .filter(|t| !trusted.contains(t))
        .collect();
    if !untrusted.is_empty() {
        return Err(ArtifactLoadError::Untrusted {
            types: untrusted.into_iter().map(str::to_string).collect(),
        });
    }

    let expected = schema::registry().feature_names();
    if envelope.feature_names != expected {
        return Err(ArtifactLoadError::FeatureMismatch {
            expected: expected.into_iter().map(str::to_string).collect(),
            found: envelope.feature_names,
        });
    }
    let n_features = expected.len();

    let mut transforms = Vec::new();
    let mut estimator = None;

    for (idx, step) in envelope.steps.into_iter().enumerate() {
        if estimator.is_some() {
            return Err(corrupt(path, "the estimator must be the last step"));
        }
        let spec: StepSpec = serde_json::from_value(step)
            .map_err(|e| corrupt(path, format!("step {}: {}", idx, e)))?;
        let at_step = |reason: String| corrupt(path, format!("step {}: {}", idx, reason));

        match spec {
            StepSpec::StandardScaler(scaler) => {
                scaler.validate(n_features).map_err(at_step)?;
                transforms.push(scaler);
            }
            StepSpec::LogisticRegression(model) => {
                model.validate(n_features).map_err(at_step)?;
                estimator = Some(Estimator::LogisticRegression(model));
            }
            StepSpec::DecisionTree(model) => {
                model.validate(n_features).map_err(at_step)?;
                estimator = Some(Estimator::DecisionTree(model));
            }
            StepSpec::RandomForest(model) => {
                model.validate(n_features).map_err(at_step)?;
                estimator = Some(Estimator::RandomForest(model));
            }
            StepSpec::OnnxSession(step) => {
                estimator = Some(onnx_estimator(path, step, n_features, options)?);
            }
        }
    }

    let estimator = estimator.ok_or_else(|| corrupt(path, "pipeline has no estimator"))?;
    let name = envelope.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string())
    });

    debug!(
        model = %name,
        transforms = transforms.len(),
        "Artifact decoded"
    );

    Ok(NativePipeline::new(name, n_features, transforms, estimator))
}

#[cfg(feature = "onnx")]
fn onnx_estimator(
    artifact: &Path,
    step: OnnxStep,
    n_features: usize,
    options: &LoadOptions,
) -> Result<Estimator, ArtifactLoadError> {
    let graph = match artifact.parent() {
        Some(dir) if step.path.is_relative() => dir.join(&step.path),
        _ => step.path,
    };
    let classifier =
        super::onnx::OnnxClassifier::load(&graph, step.classes, n_features, options.onnx_threads)?;
    Ok(Estimator::Onnx(classifier))
}

#[cfg(not(feature = "onnx"))]
fn onnx_estimator(
    _artifact: &Path,
    _step: OnnxStep,
    _n_features: usize,
    _options: &LoadOptions,
) -> Result<Estimator, ArtifactLoadError> {
    Err(ArtifactLoadError::UnsupportedStep(ONNX_SESSION.to_string()))
}
