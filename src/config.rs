//! Configuration management for the scoring service

use crate::domain::{DomainKind, FraudSchemaVariant};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Prefix for request subjects (`{prefix}.credit_risk`, `{prefix}.route`, ...)
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_subject_prefix() -> String {
    "scoring".to_string()
}

/// Location of one trained model and its column list
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArtifactConfig {
    /// ONNX model file, relative to `models_dir`
    pub model_file: String,
    /// JSON sidecar listing the training columns, relative to `models_dir`
    pub schema_file: String,
}

impl ArtifactConfig {
    fn for_domain(kind: DomainKind) -> Self {
        Self {
            model_file: format!("{}.onnx", kind.module_name()),
            schema_file: format!("{}.columns.json", kind.module_name()),
        }
    }
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing ONNX model files and schema sidecars
    pub models_dir: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Serve models without a schema sidecar in pass-through mode
    #[serde(default)]
    pub allow_schema_fallback: bool,
    pub credit_risk: ArtifactConfig,
    pub fraud_detection: ArtifactConfig,
    pub churn_prediction: ArtifactConfig,
}

fn default_onnx_threads() -> usize {
    1
}

impl ModelsConfig {
    pub fn artifact(&self, kind: DomainKind) -> &ArtifactConfig {
        match kind {
            DomainKind::CreditRisk => &self.credit_risk,
            DomainKind::FraudDetection => &self.fraud_detection,
            DomainKind::ChurnPrediction => &self.churn_prediction,
        }
    }

    pub fn model_path(&self, kind: DomainKind) -> PathBuf {
        Path::new(&self.models_dir).join(&self.artifact(kind).model_file)
    }

    pub fn schema_path(&self, kind: DomainKind) -> PathBuf {
        Path::new(&self.models_dir).join(&self.artifact(kind).schema_file)
    }
}

/// Fraud model configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FraudConfig {
    /// Feature schema the deployed fraud model was trained on
    #[serde(default)]
    pub schema_variant: FraudSchemaVariant,
}

/// Request pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum concurrently processed requests
    pub workers: usize,
    /// Per-request inference deadline in milliseconds
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, with `BFSI__*` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("BFSI").separator("__"))
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
                subject_prefix: default_subject_prefix(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                onnx_threads: 1,
                allow_schema_fallback: false,
                credit_risk: ArtifactConfig::for_domain(DomainKind::CreditRisk),
                fraud_detection: ArtifactConfig::for_domain(DomainKind::FraudDetection),
                churn_prediction: ArtifactConfig::for_domain(DomainKind::ChurnPrediction),
            },
            fraud: FraudConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                timeout_ms: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
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
        assert_eq!(config.nats.subject_prefix, "scoring");
        assert!(!config.models.allow_schema_fallback);
        assert_eq!(config.fraud.schema_variant, FraudSchemaVariant::Transactional);
        assert_eq!(
            config.models.model_path(DomainKind::ChurnPrediction),
            Path::new("models").join("churn_prediction.onnx")
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"

[models]
models_dir = "/srv/models"
allow_schema_fallback = true

[models.credit_risk]
model_file = "credit.onnx"
schema_file = "credit.json"

[models.fraud_detection]
model_file = "fraud.onnx"
schema_file = "fraud.json"

[models.churn_prediction]
model_file = "churn.onnx"
schema_file = "churn.json"

[fraud]
schema_variant = "anonymized"

[pipeline]
workers = 8
timeout_ms = 250

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.subject_prefix, "scoring");
        assert_eq!(config.models.onnx_threads, 1);
        assert!(config.models.allow_schema_fallback);
        assert_eq!(config.fraud.schema_variant, FraudSchemaVariant::Anonymized);
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(
            config.models.schema_path(DomainKind::FraudDetection),
            Path::new("/srv/models").join("fraud.json")
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::load_from_path("/nonexistent/bfsi.toml").is_err());
    }
}
