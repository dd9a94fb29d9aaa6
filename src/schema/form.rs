//! Form manifest handed to the UI collaborator.
//!
//! Widgets and choices come straight from the registry so that option order
//! in the form can never drift from the encoding the model expects.

use super::{FieldKind, SchemaRegistry};
use crate::types::record::RawRecord;
use serde::Serialize;

pub const TITLE: &str = "Heart Disease Classification";
pub const DESCRIPTION: &str = "Enter patient details to predict the likelihood of heart disease.";
pub const ARTICLE: &str = "This app is part of a CI/CD for ML project.";

/// Widget hint for a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "lowercase")]
pub enum Widget {
    Slider { min: f64, max: f64, step: f64 },
    Radio { choices: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub widget: Widget,
}

/// Everything a form renderer needs: fields in order, examples, copy text.
#[derive(Debug, Clone, Serialize)]
pub struct FormManifest {
    pub title: String,
    pub description: String,
    pub article: String,
    pub fields: Vec<FormField>,
    pub examples: Vec<RawRecord>,
    /// Number of outcome classes the result widget should show.
    pub num_top_classes: usize,
}

impl FormManifest {
    /// Manifest for the heart-disease form.
    pub fn heart() -> Self {
        Self::from_registry(super::registry())
    }

    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let fields = registry
            .fields()
            .iter()
            .map(|field| FormField {
                name: field.name.to_string(),
                label: field.display.to_string(),
                widget: match field.kind {
                    FieldKind::Numeric(spec) => Widget::Slider {
                        min: spec.min,
                        max: spec.max,
                        step: spec.step,
                    },
                    FieldKind::Categorical(labels) => Widget::Radio {
                        choices: labels.iter().map(|l| l.to_string()).collect(),
                    },
                },
            })
            .collect();

        Self {
            title: TITLE.to_string(),
            description: DESCRIPTION.to_string(),
            article: ARTICLE.to_string(),
            fields,
            examples: example_records(),
            num_top_classes: 2,
        }
    }
}

/// The two worked examples shipped with the form.
pub fn example_records() -> Vec<RawRecord> {
    vec![
        RawRecord::new()
            .with("age", 69)
            .with("sex", "Male")
            .with("cp", "Typical Angina")
            .with("trestbps", 160)
            .with("chol", 234)
            .with("fbs", "True")
            .with("restecg", "Left ventricular hypertrophy")
            .with("thalach", 131)
            .with("exang", "No")
            .with("oldpeak", 0.1)
            .with("slope", "Flat")
            .with("ca", 1)
            .with("thal", "Normal"),
        RawRecord::new()
            .with("age", 60)
            .with("sex", "Female")
            .with("cp", "Typical Angina")
            .with("trestbps", 150)
            .with("chol", 240)
            .with("fbs", "False")
            .with("restecg", "Normal")
            .with("thalach", 171)
            .with("exang", "No")
            .with("oldpeak", 0.9)
            .with("slope", "Upsloping")
            .with("ca", 0)
            .with("thal", "Normal"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::FeatureNormalizer;

    #[test]
    fn test_manifest_follows_registry_order() {
        let manifest = FormManifest::heart();
        let names: Vec<_> = manifest.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, super::super::registry().feature_names());
        assert_eq!(manifest.title, "Heart Disease Classification");
    }

    #[test]
    fn test_widget_serialization() {
        let manifest = FormManifest::heart();
        let json = serde_json::to_value(&manifest).unwrap();

        let age = &json["fields"][0];
        assert_eq!(age["widget"], "slider");
        assert_eq!(age["min"], 29.0);
        assert_eq!(age["max"], 80.0);

        let cp = &json["fields"][2];
        assert_eq!(cp["widget"], "radio");
        assert_eq!(cp["choices"][1], "Atypical Angina");
    }

    #[test]
    fn test_examples_are_valid_submissions() {
        let normalizer = FeatureNormalizer::new();
        for example in example_records() {
            assert!(normalizer.normalize(&example).is_ok());
        }
    }
}
