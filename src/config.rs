//! Configuration management for the credit risk pipeline

use crate::models::explainer::DEFAULT_TOP_K;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Prefix for environment overrides, e.g. `CREDIT_RISK__NATS__URL`
pub const ENV_PREFIX: &str = "CREDIT_RISK";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject answering risk score requests
    pub predict_subject: String,
    /// Subject answering explanation requests
    pub explain_subject: String,
    /// Queue group shared by replicas, if any
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Location of the trained artifacts
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactsConfig {
    pub dir: String,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_encoders_file")]
    pub encoders_file: String,
    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
    #[serde(default = "default_features_file")]
    pub features_file: String,
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_features_file() -> String {
    "features.json".to_string()
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "models".to_string(),
            model_file: default_model_file(),
            encoders_file: default_encoders_file(),
            scaler_file: default_scaler_file(),
            features_file: default_features_file(),
        }
    }
}

/// Explanation configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExplainConfig {
    /// Number of attributions returned per explanation
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries (0 disables the reporter)
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if self.explain.top_k == 0 {
            anyhow::bail!("explain.top_k must be at least 1");
        }
        if self.nats.predict_subject == self.nats.explain_subject {
            anyhow::bail!(
                "predict and explain subjects must differ (both are '{}')",
                self.nats.predict_subject
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "credit.risk.predict".to_string(),
                explain_subject: "credit.risk.explain".to_string(),
                queue_group: None,
            },
            artifacts: ArtifactsConfig::default(),
            explain: ExplainConfig::default(),
            pipeline: PipelineConfig {
                workers: 8,
                metrics_interval_secs: default_metrics_interval(),
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
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[nats]
url = "nats://nats:4222"
predict_subject = "risk.predict"
explain_subject = "risk.explain"
queue_group = "scorers"

[artifacts]
dir = "/srv/models"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#;

    fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.predict_subject, "credit.risk.predict");
        assert_eq!(config.explain.top_k, 5);
        assert_eq!(config.artifacts.model_file, "model.json");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_shipped_config_matches_default() {
        let config =
            AppConfig::load_from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.toml"))
                .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_optional_sections_take_defaults() {
        let (_dir, path) = write_config(MINIMAL);
        let config = AppConfig::load_from_path(&path).unwrap();

        assert_eq!(config.nats.queue_group.as_deref(), Some("scorers"));
        assert_eq!(config.artifacts.dir, "/srv/models");
        assert_eq!(config.artifacts.scaler_file, "scaler.json");
        assert_eq!(config.explain.top_k, DEFAULT_TOP_K);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let (_dir, path) = write_config(&MINIMAL.replace("workers = 2", "workers = 0"));
        assert!(AppConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_rejects_shared_subject() {
        let (_dir, path) = write_config(&MINIMAL.replace("risk.explain", "risk.predict"));
        assert!(AppConfig::load_from_path(&path).is_err());
    }
}
