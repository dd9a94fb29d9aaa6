//! Error types shared across the serving layer.

use std::path::PathBuf;
use thiserror::Error;

/// A raw form value could not be turned into a model feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// Categorical value outside the registered label set (UI/schema drift).
    #[error("unknown label {label:?} for field `{field}` (expected one of: {})", .expected.join(", "))]
    UnknownLabel {
        field: String,
        label: String,
        expected: Vec<String>,
    },

    /// Numeric value outside the field's inclusive bounds.
    #[error("value {value} for field `{field}` is outside [{min}, {max}]")]
    Range {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("field `{field}` takes whole numbers, got {value}")]
    NotInteger { field: String, value: f64 },

    #[error("field `{field}` expects a {expected}, got a {got}")]
    WrongKind {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("required field `{0}` is missing")]
    MissingField(String),

    #[error("field `{0}` is not part of the schema")]
    UnknownField(String),

    #[error("field `{0}` is not categorical")]
    NotCategorical(String),

    #[error("code {code} is not assigned for field `{field}`")]
    UnknownCode { field: String, code: u32 },
}

impl NormalizeError {
    /// Short machine-friendly name, used as a metrics key.
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizeError::UnknownLabel { .. } => "unknown_label",
            NormalizeError::Range { .. } => "range",
            NormalizeError::NotInteger { .. } => "not_integer",
            NormalizeError::WrongKind { .. } => "wrong_kind",
            NormalizeError::MissingField(_) => "missing_field",
            NormalizeError::UnknownField(_) => "unknown_field",
            NormalizeError::NotCategorical(_) => "not_categorical",
            NormalizeError::UnknownCode { .. } => "unknown_code",
        }
    }
}

/// The model artifact could not be acquired. Fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("model artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("unsupported artifact format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("artifact requires types that were not granted: {}", .types.join(", "))]
    Untrusted { types: Vec<String> },

    #[error("deployment policy refuses to grant: {}", .types.join(", "))]
    Refused { types: Vec<String> },

    #[error("artifact feature order {found:?} does not match schema order {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("pipeline step `{0}` is not supported by this build")]
    UnsupportedStep(String),

    #[error("a model is already loaded from {loaded}, refusing to load {requested}")]
    AlreadyLoaded { loaded: PathBuf, requested: PathBuf },
}

/// The pipeline failed while producing a prediction.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("expected {expected} features per row, got {got}")]
    Shape { expected: usize, got: usize },

    #[error("feature {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("pipeline does not support {0}")]
    Unsupported(&'static str),

    #[error("malformed pipeline output: {0}")]
    Output(String),

    #[error("inference runtime error: {0}")]
    Runtime(String),
}

/// Either half of a normalize-then-predict request.
#[derive(Debug, Error)]
pub enum ServingError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_label_message_lists_choices() {
        let err = NormalizeError::UnknownLabel {
            field: "sex".to_string(),
            label: "F".to_string(),
            expected: vec!["Female".to_string(), "Male".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown label \"F\" for field `sex` (expected one of: Female, Male)"
        );
        assert_eq!(err.kind(), "unknown_label");
    }

    #[test]
    fn test_serving_error_is_transparent() {
        let err: ServingError = NormalizeError::MissingField("age".to_string()).into();
        assert_eq!(err.to_string(), "required field `age` is missing");
    }
}
