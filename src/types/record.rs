//! Request-side records: raw form values and the normalized feature row.

use crate::schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single form value as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Label(String),
}

impl RawValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Number(_) => "number",
            RawValue::Label(_) => "label",
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<u32> for RawValue {
    fn from(value: u32) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Label(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Label(value)
    }
}

/// Field name to raw value, one per form submission.
///
/// Serializes as a flat JSON object, e.g. `{"age": 69, "sex": "Male", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: &str, value: impl Into<RawValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<RawValue>) -> Option<RawValue> {
        self.fields.insert(field.to_string(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<RawValue> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Numeric features in the registry's canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    features: Vec<f64>,
}

impl NormalizedRecord {
    /// Wrap an already-encoded feature row.
    ///
    /// No validation happens here; the pipeline rejects rows of the wrong
    /// width at prediction time.
    pub fn from_features(features: Vec<f64>) -> Self {
        Self { features }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Look up a feature by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        schema::registry()
            .position(name)
            .and_then(|idx| self.features.get(idx).copied())
    }

    /// `(name, value)` pairs in column order.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        schema::registry()
            .fields()
            .iter()
            .map(|f| f.name)
            .zip(self.features.iter().copied())
            .collect()
    }
}
