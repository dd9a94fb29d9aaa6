//! Pipeline capability and the native estimators behind it

use crate::error::InvocationError;
use serde::Deserialize;

#[cfg(feature = "onnx")]
use crate::models::onnx::OnnxClassifier;

/// Child index marking a leaf, as in sklearn's tree arrays.
pub const TREE_LEAF: i64 = -1;

/// A loaded, read-only classifier.
///
/// Implementations are shared across requests without locking, so every
/// method takes `&self` and must be safe to call concurrently.
pub trait ModelPipeline: Send + Sync {
    fn name(&self) -> &str;

    /// Width of each input row.
    fn n_features(&self) -> usize;

    /// Model codes, in the column order of [`predict_proba`](Self::predict_proba).
    fn classes(&self) -> &[i64];

    /// One class code per row.
    fn predict(&self, batch: &[&[f64]]) -> Result<Vec<i64>, InvocationError>;

    fn supports_proba(&self) -> bool {
        false
    }

    /// One probability row per input row.
    fn predict_proba(&self, _batch: &[&[f64]]) -> Result<Vec<Vec<f64>>, InvocationError> {
        Err(InvocationError::Unsupported("predict_proba"))
    }
}

fn check_row(row: &[f64], n_features: usize) -> Result<(), InvocationError> {
    if row.len() != n_features {
        return Err(InvocationError::Shape {
            expected: n_features,
            got: row.len(),
        });
    }
    if let Some(index) = row.iter().position(|v| !v.is_finite()) {
        return Err(InvocationError::NonFinite { index });
    }
    Ok(())
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// `(x - mean) / scale`, per column.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.mean.len() != n_features || self.scale.len() != n_features {
            return Err(format!(
                "scaler has {} means and {} scales for {} features",
                self.mean.len(),
                self.scale.len(),
                n_features
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("scaler mean is not finite".to_string());
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err("scaler scale must be finite and non-zero".to_string());
        }
        Ok(())
    }

    pub fn transform(&self, row: &mut [f64]) {
        for ((x, mean), scale) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
            *x = (*x - mean) / scale;
        }
    }
}

/// Binary logistic regression.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub classes: Vec<i64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.classes.len() != 2 {
            return Err(format!(
                "logistic regression needs 2 classes, got {}",
                self.classes.len()
            ));
        }
        if self.coef.len() != n_features {
            return Err(format!(
                "logistic regression has {} coefficients for {} features",
                self.coef.len(),
                n_features
            ));
        }
        if !self.intercept.is_finite() || self.coef.iter().any(|c| !c.is_finite()) {
            return Err("logistic regression weights are not finite".to_string());
        }
        Ok(())
    }

    fn proba(&self, row: &[f64]) -> Vec<f64> {
        let z: f64 = self
            .coef
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let positive = 1.0 / (1.0 + (-z).exp());
        vec![1.0 - positive, positive]
    }
}

/// Flattened tree in sklearn layout: node `i` splits on `feature[i]`, going
/// left when `x <= threshold[i]`. Leaves carry class counts in `value[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNodes {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl TreeNodes {
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n_nodes = self.children_left.len();
        if n_nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n_nodes)
        {
            return Err("tree node arrays differ in length".to_string());
        }

        for node in 0..n_nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == TREE_LEAF {
                if right != TREE_LEAF {
                    return Err(format!("node {} has only one child", node));
                }
                let counts = &self.value[node];
                if counts.len() != n_classes {
                    return Err(format!(
                        "leaf {} has {} class counts, expected {}",
                        node,
                        counts.len(),
                        n_classes
                    ));
                }
                if counts.iter().any(|c| !c.is_finite() || *c < 0.0)
                    || counts.iter().sum::<f64>() <= 0.0
                {
                    return Err(format!("leaf {} has invalid class counts", node));
                }
                continue;
            }

            // children always come after their parent, so traversal terminates
            let in_bounds = |child: i64| child > node as i64 && (child as usize) < n_nodes;
            if !in_bounds(left) || !in_bounds(right) {
                return Err(format!("node {} has out-of-order children", node));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", node, feature));
            }
            if !self.threshold[node].is_finite() {
                return Err(format!("node {} has a non-finite threshold", node));
            }
        }
        Ok(())
    }

    /// Normalized class distribution at the leaf `row` falls into.
    fn leaf_distribution(&self, row: &[f64]) -> Vec<f64> {
        let mut node = 0usize;
        while self.children_left[node] != TREE_LEAF {
            let split = self.feature[node] as usize;
            node = if row[split] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let counts = &self.value[node];
        let total: f64 = counts.iter().sum();
        counts.iter().map(|c| c / total).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTreeClassifier {
    pub classes: Vec<i64>,
    pub tree: TreeNodes,
}

impl DecisionTreeClassifier {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("decision tree has no classes".to_string());
        }
        self.tree.validate(n_features, self.classes.len())
    }
}

/// Mean of per-tree leaf distributions.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomForestClassifier {
    pub classes: Vec<i64>,
    pub trees: Vec<TreeNodes>,
}

impl RandomForestClassifier {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("random forest has no classes".to_string());
        }
        if self.trees.is_empty() {
            return Err("random forest has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features, self.classes.len())
                .map_err(|reason| format!("tree {}: {}", idx, reason))?;
        }
        Ok(())
    }

    fn proba(&self, row: &[f64]) -> Vec<f64> {
        let mut sum = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.leaf_distribution(row)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        sum.into_iter().map(|s| s / n_trees).collect()
    }
}

/// Final step of a pipeline.
#[derive(Debug)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTreeClassifier),
    RandomForest(RandomForestClassifier),
    #[cfg(feature = "onnx")]
    Onnx(OnnxClassifier),
}

impl Estimator {
    pub fn classes(&self) -> &[i64] {
        match self {
            Estimator::LogisticRegression(m) => &m.classes,
            Estimator::DecisionTree(m) => &m.classes,
            Estimator::RandomForest(m) => &m.classes,
            #[cfg(feature = "onnx")]
            Estimator::Onnx(m) => m.classes(),
        }
    }

    fn proba(&self, row: &[f64]) -> Result<Vec<f64>, InvocationError> {
        match self {
            Estimator::LogisticRegression(m) => Ok(m.proba(row)),
            Estimator::DecisionTree(m) => Ok(m.tree.leaf_distribution(row)),
            Estimator::RandomForest(m) => Ok(m.proba(row)),
            #[cfg(feature = "onnx")]
            Estimator::Onnx(m) => m.proba(row),
        }
    }
}

/// Transforms followed by one estimator, evaluated in-process.
#[derive(Debug)]
pub struct NativePipeline {
    name: String,
    n_features: usize,
    transforms: Vec<StandardScaler>,
    estimator: Estimator,
}

impl NativePipeline {
    /// Assemble an already-validated pipeline.
    pub fn new(
        name: impl Into<String>,
        n_features: usize,
        transforms: Vec<StandardScaler>,
        estimator: Estimator,
    ) -> Self {
        Self {
            name: name.into(),
            n_features,
            transforms,
            estimator,
        }
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    fn probabilities(&self, row: &[f64]) -> Result<Vec<f64>, InvocationError> {
        check_row(row, self.n_features)?;
        let mut x = row.to_vec();
        for transform in &self.transforms {
            transform.transform(&mut x);
        }
        self.estimator.proba(&x)
    }
}

impl ModelPipeline for NativePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        self.estimator.classes()
    }

    fn predict(&self, batch: &[&[f64]]) -> Result<Vec<i64>, InvocationError> {
        batch
            .iter()
            .map(|row| {
                let proba = self.probabilities(row)?;
                argmax(&proba)
                    .and_then(|idx| self.classes().get(idx).copied())
                    .ok_or_else(|| InvocationError::Output("empty probability row".to_string()))
            })
            .collect()
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, batch: &[&[f64]]) -> Result<Vec<Vec<f64>>, InvocationError> {
        batch.iter().map(|row| self.probabilities(row)).collect()
    }
}
