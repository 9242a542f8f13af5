//! Per-feature standardization fitted at training time

use crate::error::ArtifactLoadError;
use serde::{Deserialize, Serialize};

/// Standard scaler: `(x - mean) / scale` per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Number of columns the scaler was fitted on
    pub n_features_in: usize,
    /// Column names seen at fit time, when the trainer recorded them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactLoadError> {
        let scaler = Self {
            n_features_in: mean.len(),
            feature_names_in: None,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Check internal shape and that all fitted statistics are finite.
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        if self.mean.len() != self.n_features_in || self.scale.len() != self.n_features_in {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "scaler declares {} features but has {} means and {} scales",
                self.n_features_in,
                self.mean.len(),
                self.scale.len()
            )));
        }

        if let Some(names) = &self.feature_names_in {
            if names.len() != self.n_features_in {
                return Err(ArtifactLoadError::Inconsistent(format!(
                    "scaler declares {} features but names {}",
                    self.n_features_in,
                    names.len()
                )));
            }
        }

        let non_finite = self
            .mean
            .iter()
            .chain(&self.scale)
            .any(|v| !v.is_finite());
        if non_finite {
            return Err(ArtifactLoadError::Inconsistent(
                "scaler has non-finite mean or scale".to_string(),
            ));
        }

        Ok(())
    }

    /// Standardize `values` in place.
    ///
    /// Caller guarantees `values.len() == n_features_in`. A zero scale means the
    /// column was constant in training and is only centered.
    pub fn transform_in_place(&self, values: &mut [f64]) {
        for ((x, mean), scale) in values.iter_mut().zip(&self.mean).zip(&self.scale) {
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            *x = (*x - mean) / scale;
        }
    }

    pub fn feature_count(&self) -> usize {
        self.n_features_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform() {
        let scaler = StandardScaler::new(vec![10.0, 0.0, 5.0], vec![2.0, 0.5, 0.0]).unwrap();

        let mut values = vec![14.0, 1.0, 7.0];
        scaler.transform_in_place(&mut values);

        assert_eq!(values, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = StandardScaler::new(vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Inconsistent(_)));

        let scaler: StandardScaler = serde_json::from_str(
            r#"{"n_features_in": 3, "mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
        )
        .unwrap();
        assert!(scaler.validate().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(StandardScaler::new(vec![f64::NAN], vec![1.0]).is_err());
        assert!(StandardScaler::new(vec![0.0], vec![f64::INFINITY]).is_err());
    }
}
