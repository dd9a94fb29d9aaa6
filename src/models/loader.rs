//! Model artifact loader with trust negotiation

use crate::config::ModelConfig;
use crate::error::ArtifactLoadError;
use crate::models::artifact::{self, LoadOptions, TrustedTypes, NATIVE_TYPES};
use crate::models::pipeline::ModelPipeline;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// What this deployment is willing to trust
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    /// Granted on the first, direct load attempt
    pub preapproved: TrustedTypes,
    /// May be granted when the artifact declares them
    pub allowed: BTreeSet<String>,
}

impl TrustPolicy {
    pub fn new(preapproved: TrustedTypes, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            preapproved,
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn permits(&self, type_name: &str) -> bool {
        self.allowed.contains(type_name) || self.preapproved.contains(type_name)
    }
}

impl Default for TrustPolicy {
    /// Nothing pre-approved; native step types may be granted.
    fn default() -> Self {
        Self::new(
            TrustedTypes::none(),
            NATIVE_TYPES.iter().map(|t| t.to_string()),
        )
    }
}

/// A pipeline together with how it was obtained
#[derive(Clone)]
pub struct LoadedModel {
    pub path: PathBuf,
    pub pipeline: Arc<dyn ModelPipeline>,
    /// Types granted on the load that succeeded
    pub granted: Vec<String>,
}

/// Loads the model artifact once per process and hands out shared references
pub struct ModelLoader {
    policy: TrustPolicy,
    options: LoadOptions,
    loaded: Mutex<Option<LoadedModel>>,
}

impl ModelLoader {
    pub fn new(policy: TrustPolicy) -> Self {
        Self::with_options(policy, LoadOptions::default())
    }

    pub fn with_options(policy: TrustPolicy, options: LoadOptions) -> Self {
        Self {
            policy,
            options,
            loaded: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let policy = TrustPolicy::new(
            config.trust.preapproved.iter().cloned().collect(),
            config.trust.allowed.iter().cloned(),
        );
        Self::with_options(
            policy,
            LoadOptions {
                onnx_threads: config.onnx_threads,
            },
        )
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// The cached model, if [`load`](Self::load) has succeeded.
    pub fn loaded(&self) -> Option<LoadedModel> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load the artifact at `path`, or return the already loaded pipeline.
    ///
    /// Only one artifact is served per process: asking for a different path
    /// after a successful load fails with [`ArtifactLoadError::AlreadyLoaded`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn ModelPipeline>, ArtifactLoadError> {
        let path = path.as_ref();
        // held across negotiation so concurrent callers load exactly once
        let mut slot = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(model) = slot.as_ref() {
            if model.path != path {
                return Err(ArtifactLoadError::AlreadyLoaded {
                    loaded: model.path.clone(),
                    requested: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "Reusing loaded model");
            return Ok(Arc::clone(&model.pipeline));
        }

        let model = self.negotiate(path)?;
        let pipeline = Arc::clone(&model.pipeline);
        *slot = Some(model);
        Ok(pipeline)
    }

    /// Two-phase load, uncached.
    ///
    /// Phase one tries a direct load with the pre-approved types. If that is
    /// refused for trust reasons, phase two asks the artifact which types it
    /// declares, checks each against the policy, and retries granting
    /// exactly the declared set.
    pub fn negotiate<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel, ArtifactLoadError> {
        let path = path.as_ref();
        info!(
            path = %path.display(),
            preapproved = self.policy.preapproved.len(),
            "Loading model artifact"
        );

        let untrusted = match artifact::load_with(path, &self.policy.preapproved, &self.options) {
            Ok(pipeline) => {
                info!(model = %pipeline.name(), "Model loaded with pre-approved types");
                return Ok(LoadedModel {
                    path: path.to_path_buf(),
                    pipeline: Arc::new(pipeline),
                    granted: self.policy.preapproved.to_vec(),
                });
            }
            Err(ArtifactLoadError::Untrusted { types }) => types,
            Err(e) => return Err(e),
        };
        debug!(untrusted = ?untrusted, "Direct load refused, querying declared types");

        let declared = artifact::declared_types(path)?;
        let refused: Vec<String> = declared
            .iter()
            .filter(|t| !self.policy.permits(t))
            .cloned()
            .collect();
        if !refused.is_empty() {
            error!(refused = ?refused, "Artifact declares types the policy refuses");
            return Err(ArtifactLoadError::Refused { types: refused });
        }

        let grant: TrustedTypes = declared.iter().cloned().collect();
        let pipeline = artifact::load_with(path, &grant, &self.options).map_err(|e| {
            warn!(error = %e, "Load failed with declared types granted");
            e
        })?;

        info!(
            model = %pipeline.name(),
            granted = ?declared,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            path: path.to_path_buf(),
            pipeline: Arc::new(pipeline),
            granted: declared,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new(TrustPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::{LOGISTIC_REGRESSION, ONNX_SESSION, STANDARD_SCALER};
    use crate::models::fixtures;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_negotiation_grants_declared_types() {
        let dir = TempDir::new().unwrap();
        let path = fixtures::write_artifact(dir.path(), "heart.json", &fixtures::logistic_artifact());

        let model = ModelLoader::default().negotiate(&path).unwrap();
        assert_eq!(model.granted, vec![LOGISTIC_REGRESSION, STANDARD_SCALER]);
        assert_eq!(model.pipeline.name(), "heart_pipeline");
    }

    #[test]
    fn test_preapproved_types_load_directly() {
        let dir = TempDir::new().unwrap();
        let path = fixtures::write_artifact(dir.path(), "tree.json", &fixtures::tree_artifact());

        let policy = TrustPolicy::new(
            ["tree.DecisionTreeClassifier"].into_iter().collect(),
            Vec::new(),
        );
        let model = ModelLoader::new(policy).negotiate(&path).unwrap();
        assert_eq!(model.granted, vec!["tree.DecisionTreeClassifier"]);
    }

    #[test]
    fn test_policy_refusal() {
        let dir = TempDir::new().unwrap();
        let path = fixtures::write_artifact(dir.path(), "heart.json", &fixtures::logistic_artifact());

        let policy = TrustPolicy::new(TrustedTypes::none(), vec![STANDARD_SCALER.to_string()]);
        match ModelLoader::new(policy).negotiate(&path) {
            Err(ArtifactLoadError::Refused { types }) => {
                assert_eq!(types, vec![LOGISTIC_REGRESSION]);
            }
            Err(other) => panic!("expected Refused, got {}", other),
            Ok(_) => panic!("expected Refused, got a model"),
        }
    }

    #[test]
    fn test_onnx_not_allowed_by_default() {
        let dir = TempDir::new().unwrap();
        let artifact = json!({
            "format_version": 1,
            "feature_names": crate::schema::registry().feature_names(),
            "required_types": [ONNX_SESSION],
            "steps": [{ "type": ONNX_SESSION, "path": "heart.onnx", "classes": [0, 1] }]
        });
        let path = fixtures::write_artifact(dir.path(), "onnx.json", &artifact);

        assert!(matches!(
            ModelLoader::default().negotiate(&path),
            Err(ArtifactLoadError::Refused { .. })
        ));
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let dir = TempDir::new().unwrap();
        let loader = ModelLoader::default();

        assert!(matches!(
            loader.load(dir.path().join("missing.json")),
            Err(ArtifactLoadError::NotFound(_))
        ));
        assert!(loader.loaded().is_none());
    }

    #[test]
    fn test_load_is_cached() {
        let dir = TempDir::new().unwrap();
        let path = fixtures::write_artifact(dir.path(), "heart.json", &fixtures::logistic_artifact());
        let loader = ModelLoader::default();

        let first = loader.load(&path).unwrap();
        // the cached pipeline must not depend on the file anymore
        std::fs::remove_file(&path).unwrap();
        let second = loader.load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let row = fixtures::scenario_one_features();
        assert_eq!(
            first.predict_proba(&[row.as_slice()]).unwrap(),
            second.predict_proba(&[row.as_slice()]).unwrap()
        );
    }

    #[test]
    fn test_second_artifact_refused() {
        let dir = TempDir::new().unwrap();
        let first = fixtures::write_artifact(dir.path(), "a.json", &fixtures::logistic_artifact());
        let other = fixtures::write_artifact(dir.path(), "b.json", &fixtures::tree_artifact());
        let loader = ModelLoader::default();

        loader.load(&first).unwrap();
        assert!(matches!(
            loader.load(&other),
            Err(ArtifactLoadError::AlreadyLoaded { .. })
        ));
    }

    #[test]
    fn test_shipped_artifact_negotiates() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Model/heart_pipeline.json");
        let model = ModelLoader::default().negotiate(&path).unwrap();

        assert_eq!(model.granted, vec![LOGISTIC_REGRESSION, STANDARD_SCALER]);
        assert_eq!(model.pipeline.n_features(), 13);
        assert!(model.pipeline.supports_proba());
    }
}
