//! Feature normalization for heart-disease model inference.
//!
//! Turns a raw form submission into the numeric row the trained pipeline
//! was fitted on: categorical labels become their registry codes, numeric
//! fields are range-checked and passed through.

use crate::error::NormalizeError;
use crate::schema::{self, FieldKind, SchemaRegistry};
use crate::types::record::{NormalizedRecord, RawRecord, RawValue};

/// Normalizer that transforms raw records into model input features.
///
/// Features are emitted in the registry's canonical order, which is also
/// the order the model artifact declares.
#[derive(Debug, Clone, Copy)]
pub struct FeatureNormalizer {
    registry: &'static SchemaRegistry,
}

impl FeatureNormalizer {
    /// Create a normalizer over the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(schema::registry())
    }

    pub fn with_registry(registry: &'static SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Normalize a raw record.
    ///
    /// Every registered field must be present exactly once and no other
    /// fields are accepted. Pure: the same record always yields the same row.
    pub fn normalize(&self, raw: &RawRecord) -> Result<NormalizedRecord, NormalizeError> {
        if let Some(unknown) = raw
            .field_names()
            .find(|name| self.registry.field(name).is_none())
        {
            return Err(NormalizeError::UnknownField(unknown.to_string()));
        }

        let mut features = Vec::with_capacity(self.registry.len());

        for field in self.registry.fields() {
            let value = raw
                .get(field.name)
                .ok_or_else(|| NormalizeError::MissingField(field.name.to_string()))?;

            let feature = match (&field.kind, value) {
                (FieldKind::Numeric(_), RawValue::Number(n)) => {
                    self.registry.validate(field.name, *n)?
                }
                (FieldKind::Categorical(_), RawValue::Label(label)) => {
                    self.registry.encode(field.name, label)? as f64
                }
                (FieldKind::Numeric(_), other) => {
                    return Err(NormalizeError::WrongKind {
                        field: field.name.to_string(),
                        expected: "number",
                        got: other.kind_name(),
                    })
                }
                (FieldKind::Categorical(_), other) => {
                    return Err(NormalizeError::WrongKind {
                        field: field.name.to_string(),
                        expected: "label",
                        got: other.kind_name(),
                    })
                }
            };
            features.push(feature);
        }

        Ok(NormalizedRecord::from_features(features))
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.registry.len()
    }

    /// Get feature names (matching the model's column order).
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.registry.feature_names()
    }
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::form::example_records;

    fn scenario_one() -> RawRecord {
        example_records().remove(0)
    }

    #[test]
    fn test_scenario_one_features() {
        let normalizer = FeatureNormalizer::new();
        let record = normalizer.normalize(&scenario_one()).unwrap();

        assert_eq!(
            record.as_slice(),
            &[69.0, 1.0, 0.0, 160.0, 234.0, 1.0, 2.0, 131.0, 0.0, 0.1, 1.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_scenario_two_features() {
        let normalizer = FeatureNormalizer::new();
        let record = normalizer.normalize(&example_records()[1]).unwrap();

        assert_eq!(
            record.as_slice(),
            &[60.0, 0.0, 0.0, 150.0, 240.0, 0.0, 0.0, 171.0, 0.0, 0.9, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalizer = FeatureNormalizer::new();
        for example in example_records() {
            let first = normalizer.normalize(&example).unwrap();
            let second = normalizer.normalize(&example).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_feature_count() {
        let normalizer = FeatureNormalizer::new();
        assert_eq!(normalizer.feature_count(), 13);
        assert_eq!(normalizer.feature_names().len(), 13);
        assert_eq!(normalizer.feature_names()[2], "cp");
    }

    #[test]
    fn test_out_of_range_rejected() {
        let normalizer = FeatureNormalizer::new();

        let low_age = scenario_one().with("age", 28);
        assert!(matches!(
            normalizer.normalize(&low_age),
            Err(NormalizeError::Range { ref field, .. }) if field == "age"
        ));

        let at_bound = scenario_one().with("age", 80);
        assert!(normalizer.normalize(&at_bound).is_ok());

        let high_oldpeak = scenario_one().with("oldpeak", 6.3);
        assert!(matches!(
            normalizer.normalize(&high_oldpeak),
            Err(NormalizeError::Range { ref field, .. }) if field == "oldpeak"
        ));

        let nan = scenario_one().with("chol", f64::NAN);
        assert!(matches!(
            normalizer.normalize(&nan),
            Err(NormalizeError::Range { .. })
        ));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let normalizer = FeatureNormalizer::new();
        let record = scenario_one().with("thal", "Reversible Defect");

        match normalizer.normalize(&record) {
            Err(NormalizeError::UnknownLabel { field, label, .. }) => {
                assert_eq!(field, "thal");
                assert_eq!(label, "Reversible Defect");
            }
            other => panic!("expected UnknownLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_extra_fields() {
        let normalizer = FeatureNormalizer::new();

        let mut missing = scenario_one();
        missing.remove("slope");
        assert_eq!(
            normalizer.normalize(&missing),
            Err(NormalizeError::MissingField("slope".to_string()))
        );

        let extra = scenario_one().with("bmi", 24.0);
        assert_eq!(
            normalizer.normalize(&extra),
            Err(NormalizeError::UnknownField("bmi".to_string()))
        );
    }

    #[test]
    fn test_wrong_value_kind() {
        let normalizer = FeatureNormalizer::new();

        let code_for_label = scenario_one().with("sex", 1);
        assert!(matches!(
            normalizer.normalize(&code_for_label),
            Err(NormalizeError::WrongKind { expected: "label", got: "number", .. })
        ));

        let label_for_number = scenario_one().with("ca", "1");
        assert!(matches!(
            normalizer.normalize(&label_for_number),
            Err(NormalizeError::WrongKind { expected: "number", got: "label", .. })
        ));
    }
}
