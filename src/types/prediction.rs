//! Prediction outcome types

use crate::error::InvocationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Model output code meaning "disease present".
pub const POSITIVE_CLASS: i64 = 1;

/// Tolerance on probability rows coming out of a pipeline (f32 runtimes).
const PROBABILITY_TOLERANCE: f64 = 1e-3;

/// Binary verdict shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Heart Disease")]
    HeartDisease,
    #[serde(rename = "No Disease")]
    NoDisease,
}

impl Verdict {
    /// Interpret a model output code. Anything but 1 is "no disease".
    pub fn from_code(code: i64) -> Self {
        if code == POSITIVE_CLASS {
            Verdict::HeartDisease
        } else {
            Verdict::NoDisease
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::HeartDisease => "Heart Disease",
            Verdict::NoDisease => "No Disease",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Class probabilities as percentages with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(rename = "Heart Disease")]
    pub heart_disease: f64,
    #[serde(rename = "No Disease")]
    pub no_disease: f64,
}

impl Confidence {
    /// Build from a validated disease probability in [0, 1].
    ///
    /// The disease share is rounded to a tenth of a percent and the other
    /// share is its complement, so the pair always sums to 100.0.
    pub fn from_disease_probability(p: f64) -> Result<Self, InvocationError> {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(InvocationError::Output(format!(
                "disease probability {} outside [0, 1]",
                p
            )));
        }
        let tenths = (p * 1000.0).round() as i64;
        Ok(Self {
            heart_disease: tenths as f64 / 10.0,
            no_disease: (1000 - tenths) as f64 / 10.0,
        })
    }

    /// Collapse one probability row into the binary split.
    ///
    /// `classes[i]` is the model code for `row[i]`; every code other than
    /// [`POSITIVE_CLASS`] counts toward "no disease".
    pub fn from_row(classes: &[i64], row: &[f64]) -> Result<Self, InvocationError> {
        if classes.len() != row.len() {
            return Err(InvocationError::Output(format!(
                "{} probabilities for {} classes",
                row.len(),
                classes.len()
            )));
        }
        if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0) {
            return Err(InvocationError::Output(format!(
                "probability {} outside [0, 1]",
                bad
            )));
        }
        let total: f64 = row.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(InvocationError::Output(format!(
                "probabilities sum to {}",
                total
            )));
        }

        let disease: f64 = classes
            .iter()
            .zip(row)
            .filter(|(class, _)| **class == POSITIVE_CLASS)
            .map(|(_, p)| *p)
            .sum();
        Self::from_disease_probability((disease / total).clamp(0.0, 1.0))
    }

    pub fn get(&self, verdict: Verdict) -> f64 {
        match verdict {
            Verdict::HeartDisease => self.heart_disease,
            Verdict::NoDisease => self.no_disease,
        }
    }

    /// Label to percentage, keyed like the verdict labels.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (Verdict::HeartDisease.label().to_string(), self.heart_disease),
            (Verdict::NoDisease.label().to_string(), self.no_disease),
        ])
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub verdict: Verdict,
    /// Present only when the pipeline can report probabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl PredictionResult {
    /// Human-readable summary line.
    pub fn message(&self) -> String {
        format!("Predicted Condition: {}", self.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_code() {
        assert_eq!(Verdict::from_code(1), Verdict::HeartDisease);
        assert_eq!(Verdict::from_code(0), Verdict::NoDisease);
        assert_eq!(Verdict::from_code(2), Verdict::NoDisease);
        assert_eq!(Verdict::from_code(-1), Verdict::NoDisease);
    }

    #[test]
    fn test_confidence_rounding_sums_to_hundred() {
        let conf = Confidence::from_disease_probability(0.12345).unwrap();
        assert_eq!(conf.heart_disease, 12.3);
        assert_eq!(conf.no_disease, 87.7);

        let conf = Confidence::from_disease_probability(0.1235).unwrap();
        assert!((conf.heart_disease + conf.no_disease - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_from_row() {
        let conf = Confidence::from_row(&[0, 1], &[0.25, 0.75]).unwrap();
        assert_eq!(conf.get(Verdict::HeartDisease), 75.0);
        assert_eq!(conf.get(Verdict::NoDisease), 25.0);

        // class order in the artifact does not matter
        let conf = Confidence::from_row(&[1, 0], &[0.75, 0.25]).unwrap();
        assert_eq!(conf.heart_disease, 75.0);
    }

    #[test]
    fn test_confidence_rejects_bad_rows() {
        assert!(Confidence::from_row(&[0, 1], &[0.5]).is_err());
        assert!(Confidence::from_row(&[0, 1], &[0.5, 0.6]).is_err());
        assert!(Confidence::from_row(&[0, 1], &[f64::NAN, 1.0]).is_err());
        assert!(Confidence::from_row(&[0, 1], &[-0.1, 1.1]).is_err());
    }

    #[test]
    fn test_result_serialization() {
        let result = PredictionResult {
            verdict: Verdict::HeartDisease,
            confidence: Some(Confidence::from_disease_probability(0.6).unwrap()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["verdict"], "Heart Disease");
        assert_eq!(json["confidence"]["Heart Disease"], 60.0);
        assert_eq!(json["confidence"]["No Disease"], 40.0);
        assert_eq!(result.message(), "Predicted Condition: Heart Disease");

        let bare = PredictionResult {
            verdict: Verdict::NoDisease,
            confidence: None,
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("confidence").is_none());
    }
}
