//! Test pipelines and artifact files.

use super::pipeline::{
    DecisionTreeClassifier, Estimator, LogisticRegression, NativePipeline,
    RandomForestClassifier, StandardScaler, TreeNodes,
};
use crate::schema;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub fn scenario_one_features() -> Vec<f64> {
    vec![69.0, 1.0, 0.0, 160.0, 234.0, 1.0, 2.0, 131.0, 0.0, 0.1, 1.0, 1.0, 0.0]
}

/// Scales age around 65 with spread 10; every other column is identity.
fn age_scaler() -> StandardScaler {
    let mut mean = vec![0.0; 13];
    let mut scale = vec![1.0; 13];
    mean[0] = 65.0;
    scale[0] = 10.0;
    StandardScaler { mean, scale }
}

/// Logistic model on scaled age only: P(disease) = sigmoid((age - 65) / 10).
fn age_logistic() -> LogisticRegression {
    let mut coef = vec![0.0; 13];
    coef[0] = 1.0;
    LogisticRegression {
        classes: vec![0, 1],
        coef,
        intercept: 0.0,
    }
}

/// Splits on chest pain: typical angina (code 0) left, anything else right.
pub fn cp_tree() -> TreeNodes {
    TreeNodes {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![2, -2, -2],
        threshold: vec![0.5, -2.0, -2.0],
        value: vec![vec![9.0, 5.0], vec![8.0, 2.0], vec![1.0, 3.0]],
    }
}

/// Splits on vessel count: none left, one or more right.
fn ca_tree() -> TreeNodes {
    TreeNodes {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![11, -2, -2],
        threshold: vec![0.5, -2.0, -2.0],
        value: vec![vec![7.0, 3.0], vec![6.0, 2.0], vec![1.0, 1.0]],
    }
}

pub fn logistic_pipeline() -> NativePipeline {
    NativePipeline::new(
        "logistic",
        13,
        vec![age_scaler()],
        Estimator::LogisticRegression(age_logistic()),
    )
}

pub fn tree_pipeline() -> NativePipeline {
    NativePipeline::new(
        "tree",
        13,
        Vec::new(),
        Estimator::DecisionTree(DecisionTreeClassifier {
            classes: vec![0, 1],
            tree: cp_tree(),
        }),
    )
}

pub fn forest_pipeline() -> NativePipeline {
    NativePipeline::new(
        "forest",
        13,
        Vec::new(),
        Estimator::RandomForest(RandomForestClassifier {
            classes: vec![0, 1],
            trees: vec![cp_tree(), ca_tree()],
        }),
    )
}

fn feature_names() -> Vec<&'static str> {
    schema::registry().feature_names()
}

fn tree_json(tree: &TreeNodes) -> Value {
    json!({
        "children_left": tree.children_left,
        "children_right": tree.children_right,
        "feature": tree.feature,
        "threshold": tree.threshold,
        "value": tree.value,
    })
}

/// Artifact equivalent of [`logistic_pipeline`].
pub fn logistic_artifact() -> Value {
    let scaler = age_scaler();
    let model = age_logistic();
    json!({
        "format_version": 1,
        "name": "heart_pipeline",
        "feature_names": feature_names(),
        "required_types": [
            "preprocessing.StandardScaler",
            "linear_model.LogisticRegression"
        ],
        "steps": [
            { "type": "preprocessing.StandardScaler", "mean": scaler.mean, "scale": scaler.scale },
            {
                "type": "linear_model.LogisticRegression",
                "classes": model.classes,
                "coef": model.coef,
                "intercept": model.intercept
            }
        ]
    })
}

/// Artifact equivalent of [`forest_pipeline`].
pub fn forest_artifact() -> Value {
    json!({
        "format_version": 1,
        "name": "heart_forest",
        "feature_names": feature_names(),
        "required_types": ["ensemble.RandomForestClassifier"],
        "steps": [
            {
                "type": "ensemble.RandomForestClassifier",
                "classes": [0, 1],
                "trees": [tree_json(&cp_tree()), tree_json(&ca_tree())]
            }
        ]
    })
}

/// Artifact equivalent of [`tree_pipeline`].
pub fn tree_artifact() -> Value {
    json!({
        "format_version": 1,
        "name": "heart_tree",
        "feature_names": feature_names(),
        "required_types": ["tree.DecisionTreeClassifier"],
        "steps": [
            { "type": "tree.DecisionTreeClassifier", "classes": [0, 1], "tree": tree_json(&cp_tree()) }
        ]
    })
}

pub fn write_artifact(dir: &Path, file_name: &str, artifact: &Value) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, serde_json::to_vec_pretty(artifact).unwrap()).unwrap();
    path
}
