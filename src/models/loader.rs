//! Artifact sources for the bundle loader

use crate::config::ArtifactsConfig;
use crate::error::ArtifactLoadError;
use crate::models::encoder::CategoricalEncoder;
use crate::models::forest::{ModelArtifact, TreeEnsemble};
use crate::models::scaler::StandardScaler;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Capability that yields the four deserialized training artifacts.
pub trait ArtifactSource {
    fn classifier(&self) -> Result<TreeEnsemble, ArtifactLoadError>;
    fn encoders(&self) -> Result<BTreeMap<String, CategoricalEncoder>, ArtifactLoadError>;
    fn scaler(&self) -> Result<StandardScaler, ArtifactLoadError>;
    fn feature_order(&self) -> Result<Vec<String>, ArtifactLoadError>;
}

/// Reads artifacts as JSON files from one directory
#[derive(Debug, Clone)]
pub struct FileArtifactSource {
    dir: PathBuf,
    model_file: String,
    encoders_file: String,
    scaler_file: String,
    features_file: String,
}

impl FileArtifactSource {
    /// Source with the default file names
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            model_file: "model.json".to_string(),
            encoders_file: "encoders.json".to_string(),
            scaler_file: "scaler.json".to_string(),
            features_file: "features.json".to_string(),
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            model_file: config.model_file.clone(),
            encoders_file: config.encoders_file.clone(),
            scaler_file: config.scaler_file.clone(),
            features_file: config.features_file.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        artifact: &'static str,
        file: &str,
    ) -> Result<T, ArtifactLoadError> {
        let path = self.dir.join(file);
        debug!(artifact = artifact, path = %path.display(), "Reading artifact");

        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ArtifactLoadError::Missing {
                artifact,
                path: path.clone(),
            },
            _ => ArtifactLoadError::Unreadable {
                artifact,
                path: path.clone(),
                source,
            },
        })?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|source| ArtifactLoadError::Malformed { artifact, source })?;

        info!(artifact = artifact, path = %path.display(), bytes = bytes.len(), "Artifact read");
        Ok(value)
    }
}

impl ArtifactSource for FileArtifactSource {
    fn classifier(&self) -> Result<TreeEnsemble, ArtifactLoadError> {
        let artifact: ModelArtifact = self.read_json("classifier", &self.model_file)?;
        TreeEnsemble::from_artifact(artifact)
    }

    fn encoders(&self) -> Result<BTreeMap<String, CategoricalEncoder>, ArtifactLoadError> {
        self.read_json("encoders", &self.encoders_file)
    }

    fn scaler(&self) -> Result<StandardScaler, ArtifactLoadError> {
        let scaler: StandardScaler = self.read_json("scaler", &self.scaler_file)?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn feature_order(&self) -> Result<Vec<String>, ArtifactLoadError> {
        self.read_json("feature_order", &self.features_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bundle::ArtifactBundle;
    use crate::models::test_support::FIXTURE_DIR;
    use tempfile::TempDir;

    fn copy_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in ["model.json", "encoders.json", "scaler.json", "features.json"] {
            fs::copy(Path::new(FIXTURE_DIR).join(file), dir.path().join(file)).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_fixture_bundle() {
        let bundle = ArtifactBundle::from_source(&FileArtifactSource::new(FIXTURE_DIR)).unwrap();
        assert_eq!(bundle.feature_count(), 15);
        assert_eq!(bundle.classifier().trees().len(), 4);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = copy_fixture();
        fs::remove_file(dir.path().join("scaler.json")).unwrap();

        let err = ArtifactBundle::from_source(&FileArtifactSource::new(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            ArtifactLoadError::Missing {
                artifact: "scaler",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_artifact() {
        let dir = copy_fixture();
        fs::write(dir.path().join("encoders.json"), b"{\"CODE_GENDER\": [\"F\"]").unwrap();

        let err = ArtifactBundle::from_source(&FileArtifactSource::new(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            ArtifactLoadError::Malformed {
                artifact: "encoders",
                ..
            }
        ));
    }

    #[test]
    fn test_inconsistent_scaler_width() {
        let dir = copy_fixture();
        fs::write(
            dir.path().join("scaler.json"),
            r#"{"n_features_in": 2, "mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
        )
        .unwrap();

        let err = ArtifactBundle::from_source(&FileArtifactSource::new(dir.path())).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Inconsistent(_)));
    }

    #[test]
    fn test_custom_file_names() {
        let dir = copy_fixture();
        fs::rename(dir.path().join("model.json"), dir.path().join("xgb_model.json")).unwrap();

        let config = ArtifactsConfig {
            dir: dir.path().display().to_string(),
            model_file: "xgb_model.json".to_string(),
            ..ArtifactsConfig::default()
        };
        let source = FileArtifactSource::from_config(&config);
        assert!(source.classifier().is_ok());
    }
}
