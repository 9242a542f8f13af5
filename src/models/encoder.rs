//! Categorical label encoder fitted at training time

use crate::error::ArtifactLoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A label the encoder never saw during training.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unseen category {label:?}")]
pub struct UnseenCategory {
    pub label: String,
}

/// Persisted form of an encoder: `{"classes": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub classes: Vec<String>,
}

/// Bidirectional mapping between known category labels and integer codes.
///
/// The code of a label is its position in `classes`. The first class is the
/// fallback for labels never seen in training and is fixed when the encoder
/// is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncoderArtifact", into = "EncoderArtifact")]
pub struct CategoricalEncoder {
    classes: Vec<String>,
    codes: HashMap<String, u32>,
}

impl CategoricalEncoder {
    pub fn new<I, S>(classes: I) -> Result<Self, ArtifactLoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if classes.is_empty() {
            return Err(ArtifactLoadError::Inconsistent(
                "encoder has no classes".to_string(),
            ));
        }

        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code as u32).is_some() {
                return Err(ArtifactLoadError::Inconsistent(format!(
                    "encoder lists class {:?} twice",
                    class
                )));
            }
        }

        Ok(Self { classes, codes })
    }

    /// Code for a known label.
    pub fn encode(&self, label: &str) -> Result<u32, UnseenCategory> {
        self.codes.get(label).copied().ok_or_else(|| UnseenCategory {
            label: label.to_string(),
        })
    }

    pub fn fallback_class(&self) -> &str {
        &self.classes[0]
    }

    pub fn fallback_code(&self) -> u32 {
        0
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TryFrom<EncoderArtifact> for CategoricalEncoder {
    type Error = ArtifactLoadError;

    fn try_from(artifact: EncoderArtifact) -> Result<Self, Self::Error> {
        Self::new(artifact.classes)
    }
}

impl From<CategoricalEncoder> for EncoderArtifact {
    fn from(encoder: CategoricalEncoder) -> Self {
        Self {
            classes: encoder.classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_and_unseen() {
        let encoder = CategoricalEncoder::new(["F", "M", "XNA"]).unwrap();

        assert_eq!(encoder.encode("F"), Ok(0));
        assert_eq!(encoder.encode("XNA"), Ok(2));
        assert_eq!(
            encoder.encode("X"),
            Err(UnseenCategory {
                label: "X".to_string()
            })
        );
        assert_eq!(encoder.classes()[1], "M");
    }

    #[test]
    fn test_fallback_is_first_class() {
        let encoder = CategoricalEncoder::new(["Cash loans", "Revolving loans"]).unwrap();
        assert_eq!(encoder.fallback_class(), "Cash loans");
        assert_eq!(encoder.encode(encoder.fallback_class()), Ok(encoder.fallback_code()));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_classes() {
        assert!(CategoricalEncoder::new(Vec::<String>::new()).is_err());
        assert!(CategoricalEncoder::new(["N", "Y", "N"]).is_err());
    }

    #[test]
    fn test_artifact_deserialization() {
        let encoder: CategoricalEncoder =
            serde_json::from_str(r#"{"classes": ["N", "Y"]}"#).unwrap();
        assert_eq!(encoder.len(), 2);
        assert_eq!(encoder.encode("Y"), Ok(1));

        let duplicate = serde_json::from_str::<CategoricalEncoder>(r#"{"classes": ["N", "N"]}"#);
        assert!(duplicate.is_err());
    }
}
