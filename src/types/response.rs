//! Reply envelope sent back to the form host

use crate::error::{InvocationError, NormalizeError};
use crate::types::prediction::{PredictionResult, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome class of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Prediction produced.
    Ok,
    /// Input did not pass normalization; the user can fix it.
    Rejected,
    /// The pipeline failed; not the user's fault.
    Failed,
}

/// Reply to one form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Unique reply identifier
    pub request_id: String,

    pub status: ResponseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,

    /// "Predicted Condition: ..." line for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Outcome label to percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<BTreeMap<String, f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error kind for rejected input, e.g. `unknown_label`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    pub evaluated_at: DateTime<Utc>,
}

impl PredictionResponse {
    fn new(status: ResponseStatus) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            status,
            verdict: None,
            message: None,
            confidence: None,
            error: None,
            error_kind: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn success(result: &PredictionResult) -> Self {
        let mut response = Self::new(ResponseStatus::Ok);
        response.verdict = Some(result.verdict);
        response.message = Some(result.message());
        response.confidence = result.confidence.map(|c| c.to_map());
        response
    }

    pub fn rejected(err: &NormalizeError) -> Self {
        let mut response = Self::new(ResponseStatus::Rejected);
        response.error = Some(err.to_string());
        response.error_kind = Some(err.kind().to_string());
        response
    }

    /// Payload that was not a JSON object of field values.
    pub fn malformed(err: &serde_json::Error) -> Self {
        let mut response = Self::new(ResponseStatus::Rejected);
        response.error = Some(format!("invalid request payload: {}", err));
        response.error_kind = Some("malformed".to_string());
        response
    }

    pub fn failed(err: &InvocationError) -> Self {
        let mut response = Self::new(ResponseStatus::Failed);
        response.error = Some(err.to_string());
        response
    }
}
