//! Schema registry: the single source of truth for field order, label
//! encodings and numeric ranges.

pub mod fields;
pub mod form;

use crate::error::NormalizeError;
use std::collections::HashMap;
use std::sync::OnceLock;

pub use fields::{FieldKind, FieldSpec, NumericSpec, HEART_FIELDS};
pub use form::FormManifest;

static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// Process-wide registry, built on first use and never mutated.
pub fn registry() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(SchemaRegistry::heart)
}

/// Immutable lookup tables over a fixed list of [`FieldSpec`]s.
#[derive(Debug)]
pub struct SchemaRegistry {
    fields: &'static [FieldSpec],
    by_name: HashMap<&'static str, usize>,
}

impl SchemaRegistry {
    /// Registry for the heart-disease pipeline.
    pub fn heart() -> Self {
        Self::from_fields(&HEART_FIELDS)
    }

    pub fn from_fields(fields: &'static [FieldSpec]) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name, idx))
            .collect();
        Self { fields, by_name }
    }

    /// All fields in canonical pipeline order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        let fields = self.fields;
        self.by_name.get(name).map(|&idx| &fields[idx])
    }

    /// Column position of `name` in the normalized feature vector.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Feature names in canonical order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    fn categorical(&self, field: &str) -> Result<&'static [&'static str], NormalizeError> {
        let spec = self
            .field(field)
            .ok_or_else(|| NormalizeError::UnknownField(field.to_string()))?;
        spec.labels()
            .ok_or_else(|| NormalizeError::NotCategorical(field.to_string()))
    }

    /// Ordered labels of a categorical field.
    pub fn labels(&self, field: &str) -> Result<&'static [&'static str], NormalizeError> {
        self.categorical(field)
    }

    /// Map a label to the code the model was trained with.
    pub fn encode(&self, field: &str, label: &str) -> Result<u32, NormalizeError> {
        let labels = self.categorical(field)?;
        labels
            .iter()
            .position(|&l| l == label)
            .map(|idx| idx as u32)
            .ok_or_else(|| NormalizeError::UnknownLabel {
                field: field.to_string(),
                label: label.to_string(),
                expected: labels.iter().map(|l| l.to_string()).collect(),
            })
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(&self, field: &str, code: u32) -> Result<&'static str, NormalizeError> {
        let labels = self.categorical(field)?;
        labels
            .get(code as usize)
            .copied()
            .ok_or_else(|| NormalizeError::UnknownCode {
                field: field.to_string(),
                code,
            })
    }

    /// Declared range of a numeric field, `None` for categorical or unknown.
    pub fn range(&self, field: &str) -> Option<&'static NumericSpec> {
        self.field(field).and_then(FieldSpec::range)
    }

    /// Check a numeric value against the field's declared range.
    pub fn validate(&self, field: &str, value: f64) -> Result<f64, NormalizeError> {
        let spec = self
            .field(field)
            .ok_or_else(|| NormalizeError::UnknownField(field.to_string()))?;
        let range = spec.range().ok_or(NormalizeError::WrongKind {
            field: field.to_string(),
            expected: "label",
            got: "number",
        })?;

        if !range.contains(value) {
            return Err(NormalizeError::Range {
                field: field.to_string(),
                value,
                min: range.min,
                max: range.max,
            });
        }
        if range.integer && value.fract() != 0.0 {
            return Err(NormalizeError::NotInteger {
                field: field.to_string(),
                value,
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_bijection() {
        let reg = registry();
        for field in reg.fields().iter().filter(|f| f.is_categorical()) {
            let labels = reg.labels(field.name).unwrap();
            for (expected_code, label) in labels.iter().enumerate() {
                let code = reg.encode(field.name, label).unwrap();
                assert_eq!(code as usize, expected_code);
                assert_eq!(reg.decode(field.name, code).unwrap(), *label);
            }
            // every code 0..n-1 reachable, nothing beyond
            assert!(reg.decode(field.name, labels.len() as u32).is_err());
        }
    }

    #[test]
    fn test_canonical_encodings() {
        let reg = registry();
        assert_eq!(reg.encode("sex", "Female").unwrap(), 0);
        assert_eq!(reg.encode("sex", "Male").unwrap(), 1);
        assert_eq!(reg.encode("cp", "Typical Angina").unwrap(), 0);
        assert_eq!(reg.encode("cp", "Atypical Angina").unwrap(), 1);
        assert_eq!(reg.encode("cp", "Asymptomatic").unwrap(), 3);
        assert_eq!(reg.encode("restecg", "Left ventricular hypertrophy").unwrap(), 2);
        assert_eq!(reg.encode("thal", "Reversable Defect").unwrap(), 2);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let err = registry().encode("cp", "typical angina").unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownLabel { ref field, .. } if field == "cp"));
    }

    #[test]
    fn test_encode_on_numeric_field() {
        assert_eq!(
            registry().encode("age", "69"),
            Err(NormalizeError::NotCategorical("age".to_string()))
        );
        assert_eq!(
            registry().encode("height", "tall"),
            Err(NormalizeError::UnknownField("height".to_string()))
        );
    }

    #[test]
    fn test_range_boundaries() {
        let reg = registry();
        assert!(reg.validate("age", 29.0).is_ok());
        assert!(reg.validate("age", 80.0).is_ok());
        assert!(matches!(reg.validate("age", 28.0), Err(NormalizeError::Range { .. })));
        assert!(matches!(reg.validate("age", 81.0), Err(NormalizeError::Range { .. })));
        assert!(reg.validate("ca", 0.0).is_ok());
        assert!(matches!(reg.validate("ca", 4.0), Err(NormalizeError::Range { .. })));
        assert!(reg.validate("oldpeak", 6.2).is_ok());
        assert!(matches!(reg.validate("oldpeak", 7.2), Err(NormalizeError::Range { .. })));
        assert!(matches!(reg.validate("oldpeak", -1.0), Err(NormalizeError::Range { .. })));
    }

    #[test]
    fn test_integer_fields_reject_fractions() {
        assert!(matches!(
            registry().validate("chol", 234.5),
            Err(NormalizeError::NotInteger { .. })
        ));
        assert!(registry().validate("oldpeak", 2.3).is_ok());
    }

    #[test]
    fn test_positions_follow_declaration_order() {
        let reg = registry();
        assert_eq!(reg.position("age"), Some(0));
        assert_eq!(reg.position("oldpeak"), Some(9));
        assert_eq!(reg.position("thal"), Some(12));
        assert_eq!(reg.len(), 13);
    }
}
