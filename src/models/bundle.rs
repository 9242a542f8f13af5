//! Immutable container for every artifact the pipeline needs at inference time

use crate::error::ArtifactLoadError;
use crate::models::encoder::CategoricalEncoder;
use crate::models::forest::TreeEnsemble;
use crate::models::loader::ArtifactSource;
use crate::models::scaler::StandardScaler;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Classifier, encoders, scaler and canonical feature order, validated together.
///
/// Built once at startup and shared read-only by all requests.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    classifier: TreeEnsemble,
    encoders: BTreeMap<String, CategoricalEncoder>,
    scaler: StandardScaler,
    feature_order: Vec<String>,
    fingerprint: String,
}

#[derive(Serialize)]
struct CanonicalBundle<'a> {
    feature_order: &'a [String],
    encoders: &'a BTreeMap<String, CategoricalEncoder>,
    scaler: &'a StandardScaler,
    classifier: &'a TreeEnsemble,
}

impl ArtifactBundle {
    /// Assemble and cross-validate a bundle.
    pub fn new(
        classifier: TreeEnsemble,
        encoders: BTreeMap<String, CategoricalEncoder>,
        scaler: StandardScaler,
        feature_order: Vec<String>,
    ) -> Result<Self, ArtifactLoadError> {
        validate_feature_order(&feature_order)?;

        if let Some(name) = encoders.keys().find(|name| !feature_order.contains(name)) {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "encoder for `{}` has no column in the feature order",
                name
            )));
        }

        scaler.validate()?;
        if scaler.feature_count() != feature_order.len() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "scaler expects {} features, feature order has {}",
                scaler.feature_count(),
                feature_order.len()
            )));
        }
        if let Some(names) = &scaler.feature_names_in {
            if names != &feature_order {
                return Err(ArtifactLoadError::Inconsistent(
                    "scaler was fitted on a different column order".to_string(),
                ));
            }
        }

        if let Some(names) = classifier.feature_names() {
            if names != feature_order.as_slice() {
                return Err(ArtifactLoadError::Inconsistent(
                    "classifier was trained on a different column order".to_string(),
                ));
            }
        }
        if classifier.min_feature_count() > feature_order.len() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "classifier reads feature index {} but only {} features exist",
                classifier.min_feature_count() - 1,
                feature_order.len()
            )));
        }

        let fingerprint = fingerprint(&CanonicalBundle {
            feature_order: &feature_order,
            encoders: &encoders,
            scaler: &scaler,
            classifier: &classifier,
        })?;

        Ok(Self {
            classifier,
            encoders,
            scaler,
            feature_order,
            fingerprint,
        })
    }

    /// Pull every artifact from `source` and assemble the bundle.
    pub fn from_source<S: ArtifactSource + ?Sized>(source: &S) -> Result<Self, ArtifactLoadError> {
        let feature_order = source.feature_order()?;
        let encoders = source.encoders()?;
        let scaler = source.scaler()?;
        let classifier = source.classifier()?;

        let bundle = Self::new(classifier, encoders, scaler, feature_order)?;

        info!(
            features = bundle.feature_count(),
            categorical = bundle.encoders.len(),
            trees = bundle.classifier.trees().len(),
            fingerprint = %bundle.fingerprint,
            "Artifact bundle loaded"
        );

        Ok(bundle)
    }

    pub fn classifier(&self) -> &TreeEnsemble {
        &self.classifier
    }

    pub fn encoder(&self, feature: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(feature)
    }

    pub fn encoders(&self) -> &BTreeMap<String, CategoricalEncoder> {
        &self.encoders
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    /// Width of every aligned vector
    pub fn feature_count(&self) -> usize {
        self.feature_order.len()
    }

    /// Hex SHA-256 of the canonical artifact serialization
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn validate_feature_order(feature_order: &[String]) -> Result<(), ArtifactLoadError> {
    if feature_order.is_empty() {
        return Err(ArtifactLoadError::Inconsistent(
            "feature order is empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(feature_order.len());
    if let Some(name) = feature_order.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(ArtifactLoadError::Inconsistent(format!(
            "feature `{}` appears twice in the feature order",
            name
        )));
    }

    Ok(())
}

fn fingerprint(bundle: &CanonicalBundle<'_>) -> Result<String, ArtifactLoadError> {
    let canonical = serde_json::to_vec(bundle).map_err(|source| ArtifactLoadError::Malformed {
        artifact: "bundle",
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;

    fn parts() -> (
        TreeEnsemble,
        BTreeMap<String, CategoricalEncoder>,
        StandardScaler,
        Vec<String>,
    ) {
        let bundle = test_support::fixture_bundle();
        (
            bundle.classifier().clone(),
            bundle.encoders().clone(),
            bundle.scaler().clone(),
            bundle.feature_order().to_vec(),
        )
    }

    #[test]
    fn test_fixture_bundle_is_valid() {
        let bundle = test_support::fixture_bundle();
        assert_eq!(bundle.feature_count(), 15);
        assert_eq!(bundle.encoders().len(), 6);
        assert!(bundle.encoder("CODE_GENDER").is_some());
        assert!(bundle.encoder("AMT_CREDIT").is_none());
        assert_eq!(bundle.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let (classifier, encoders, scaler, order) = parts();
        let a = ArtifactBundle::new(
            classifier.clone(),
            encoders.clone(),
            scaler.clone(),
            order.clone(),
        )
        .unwrap();
        let b = ArtifactBundle::new(classifier, encoders, scaler, order).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_scaler_width_mismatch() {
        let (classifier, encoders, scaler, mut order) = parts();
        order.push("EXTRA_COLUMN".to_string());

        let err = ArtifactBundle::new(classifier, encoders, scaler, order).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Inconsistent(_)));
    }

    #[test]
    fn test_encoder_outside_feature_order() {
        let (classifier, mut encoders, scaler, order) = parts();
        encoders.insert(
            "NAME_HOUSING_TYPE".to_string(),
            CategoricalEncoder::new(["House / apartment"]).unwrap(),
        );

        assert!(ArtifactBundle::new(classifier, encoders, scaler, order).is_err());
    }

    #[test]
    fn test_duplicate_and_empty_feature_order() {
        let (classifier, encoders, scaler, _) = parts();
        assert!(ArtifactBundle::new(classifier, encoders, scaler, Vec::new()).is_err());

        let (classifier, encoders, scaler, mut order) = parts();
        order[14] = order[0].clone();
        assert!(ArtifactBundle::new(classifier, encoders, scaler, order).is_err());
    }

    #[test]
    fn test_reordered_columns_rejected() {
        let (classifier, encoders, mut scaler, mut order) = parts();
        order.swap(3, 4);
        scaler.feature_names_in = None;

        // classifier still carries the trained order
        assert!(ArtifactBundle::new(classifier, encoders, scaler, order).is_err());
    }
}
