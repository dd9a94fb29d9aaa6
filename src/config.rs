//! Configuration management for the prediction service

use crate::models::artifact::NATIVE_TYPES;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "HEART_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for prediction requests
    pub predict_subject: String,
    /// Subject answering with the form manifest
    pub form_subject: String,
    /// Queue group so several replicas share the request load
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path of the serialized pipeline
    pub artifact_path: String,
    /// Include class percentages in replies when the model supports them
    #[serde(default = "default_report_confidence")]
    pub report_confidence: bool,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    #[serde(default)]
    pub trust: TrustConfig,
}

/// Deserialization trust policy
#[derive(Debug, Clone, Deserialize)]
pub struct TrustConfig {
    /// Types granted on the first load attempt
    #[serde(default)]
    pub preapproved: Vec<String>,
    /// Types that may be granted when the artifact declares them
    #[serde(default = "default_allowed_types")]
    pub allowed: Vec<String>,
}

fn default_report_confidence() -> bool {
    true
}

fn default_onnx_threads() -> usize {
    1
}

fn default_allowed_types() -> Vec<String> {
    NATIVE_TYPES.iter().map(|t| t.to_string()).collect()
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            preapproved: Vec::new(),
            allowed: default_allowed_types(),
        }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Maximum requests evaluated concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_metrics_interval() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            metrics_interval_secs: default_metrics_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$HEART_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `HEART__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("HEART").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "heart.predict".to_string(),
                form_subject: "heart.form".to_string(),
                queue_group: Some("heart-risk-serving".to_string()),
            },
            model: ModelConfig {
                artifact_path: "Model/heart_pipeline.json".to_string(),
                report_confidence: true,
                onnx_threads: 1,
                trust: TrustConfig::default(),
            },
            service: ServiceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.predict_subject, "heart.predict");
        assert!(config.model.report_confidence);
        assert!(config.model.trust.preapproved.is_empty());
        assert_eq!(config.model.trust.allowed.len(), 4);
        assert_eq!(config.service.workers, 4);
    }

    #[test]
    fn test_load_minimal_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
predict_subject = "p"
form_subject = "f"

[model]
artifact_path = "model.json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.nats.queue_group, None);
        assert_eq!(config.model.artifact_path, "model.json");
        assert!(config.model.report_confidence);
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.model.trust.allowed, default_allowed_types());
        assert_eq!(config.service.metrics_interval_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.nats.form_subject, "heart.form");
        assert_eq!(config.model.trust.allowed.len(), 4);
    }
}
