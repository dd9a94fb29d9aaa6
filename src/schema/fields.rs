//! Field declarations for the heart-disease form.
//!
//! One entry per model input, in the exact column order the trained
//! pipeline was fitted with. Categorical codes are the label's position in
//! its list.

use serde::Serialize;

/// Inclusive numeric bounds plus the UI step size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Whole numbers only (slider step of 1).
    pub integer: bool,
}

impl NumericSpec {
    const fn integer(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            step: 1.0,
            integer: true,
        }
    }

    const fn decimal(min: f64, max: f64, step: f64) -> Self {
        Self {
            min,
            max,
            step,
            integer: false,
        }
    }

    /// Whether `value` lies within the inclusive bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// What kind of value a field carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Numeric(NumericSpec),
    /// Ordered labels; a label's index is its code.
    Categorical(&'static [&'static str]),
}

/// A single model input as declared by the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Column name in the trained pipeline.
    pub name: &'static str,
    /// Label shown next to the form widget.
    pub display: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FieldKind::Categorical(_))
    }

    pub fn labels(&self) -> Option<&'static [&'static str]> {
        match self.kind {
            FieldKind::Categorical(labels) => Some(labels),
            FieldKind::Numeric(_) => None,
        }
    }

    pub fn range(&self) -> Option<&NumericSpec> {
        match &self.kind {
            FieldKind::Numeric(spec) => Some(spec),
            FieldKind::Categorical(_) => None,
        }
    }
}

pub const SEX: &[&str] = &["Female", "Male"];
pub const CHEST_PAIN: &[&str] = &[
    "Typical Angina",
    "Atypical Angina",
    "Non-anginal",
    "Asymptomatic",
];
pub const FASTING_BLOOD_SUGAR: &[&str] = &["False", "True"];
pub const RESTING_ECG: &[&str] = &[
    "Normal",
    "ST-T wave abnormality",
    "Left ventricular hypertrophy",
];
pub const EXERCISE_ANGINA: &[&str] = &["No", "Yes"];
pub const ST_SLOPE: &[&str] = &["Upsloping", "Flat", "Downsloping"];
pub const THALASSEMIA: &[&str] = &["Normal", "Fixed Defect", "Reversable Defect"];

/// Every model input, in pipeline column order.
pub static HEART_FIELDS: [FieldSpec; 13] = [
    FieldSpec {
        name: "age",
        display: "Age",
        kind: FieldKind::Numeric(NumericSpec::integer(29.0, 80.0)),
    },
    FieldSpec {
        name: "sex",
        display: "Sex",
        kind: FieldKind::Categorical(SEX),
    },
    FieldSpec {
        name: "cp",
        display: "Chest Pain Type (CP)",
        kind: FieldKind::Categorical(CHEST_PAIN),
    },
    FieldSpec {
        name: "trestbps",
        display: "Resting Blood Pressure (trestbps)",
        kind: FieldKind::Numeric(NumericSpec::integer(90.0, 200.0)),
    },
    FieldSpec {
        name: "chol",
        display: "Cholesterol (chol)",
        kind: FieldKind::Numeric(NumericSpec::integer(100.0, 600.0)),
    },
    FieldSpec {
        name: "fbs",
        display: "Fasting Blood Sugar > 120 mg/dl (fbs)",
        kind: FieldKind::Categorical(FASTING_BLOOD_SUGAR),
    },
    FieldSpec {
        name: "restecg",
        display: "Resting ECG (restecg)",
        kind: FieldKind::Categorical(RESTING_ECG),
    },
    FieldSpec {
        name: "thalach",
        display: "Max Heart Rate (thalach)",
        kind: FieldKind::Numeric(NumericSpec::integer(60.0, 220.0)),
    },
    FieldSpec {
        name: "exang",
        display: "Exercise Induced Angina (exang)",
        kind: FieldKind::Categorical(EXERCISE_ANGINA),
    },
    FieldSpec {
        name: "oldpeak",
        display: "ST Depression (oldpeak)",
        kind: FieldKind::Numeric(NumericSpec::decimal(0.0, 6.2, 0.1)),
    },
    FieldSpec {
        name: "slope",
        display: "Slope of Peak Exercise ST",
        kind: FieldKind::Categorical(ST_SLOPE),
    },
    FieldSpec {
        name: "ca",
        display: "Number of Major Vessels (ca)",
        kind: FieldKind::Numeric(NumericSpec::integer(0.0, 3.0)),
    },
    FieldSpec {
        name: "thal",
        display: "Thalassemia (thal)",
        kind: FieldKind::Categorical(THALASSEMIA),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<_> = HEART_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HEART_FIELDS.len());
    }

    #[test]
    fn test_seven_categorical_six_numeric() {
        let categorical = HEART_FIELDS.iter().filter(|f| f.is_categorical()).count();
        assert_eq!(categorical, 7);
        assert_eq!(HEART_FIELDS.len() - categorical, 6);
    }

    #[test]
    fn test_numeric_bounds_inclusive() {
        let oldpeak = HEART_FIELDS[9].range().unwrap();
        assert!(oldpeak.contains(0.0));
        assert!(oldpeak.contains(6.2));
        assert!(!oldpeak.contains(6.3));
        assert!(!oldpeak.contains(f64::NAN));
    }
}
