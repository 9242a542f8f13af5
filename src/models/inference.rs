//! Risk scoring on aligned feature vectors

use crate::error::ScoringError;
use crate::feature_aligner::AlignedVector;
use crate::models::bundle::ArtifactBundle;
use crate::types::assessment::RiskAssessment;
use tracing::{debug, error};

/// Runs the bundle's classifier and thresholds the default probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Default probability for `vector`, unrounded.
    pub fn probability(
        &self,
        vector: &AlignedVector,
        bundle: &ArtifactBundle,
    ) -> Result<f64, ScoringError> {
        check_shape(vector, bundle)?;
        Ok(bundle.classifier().predict_proba(vector.as_slice()))
    }

    /// Score one applicant: probability rounded to 4 places, labelled at 0.5.
    pub fn score(
        &self,
        vector: &AlignedVector,
        bundle: &ArtifactBundle,
    ) -> Result<RiskAssessment, ScoringError> {
        let probability = self.probability(vector, bundle)?;
        let assessment = RiskAssessment::from_probability(probability);

        debug!(
            probability = probability,
            risk_score = assessment.score,
            risk_label = assessment.label.as_str(),
            "Scored applicant"
        );

        Ok(assessment)
    }
}

/// Reject vectors that were not produced for this bundle.
pub(crate) fn check_shape(
    vector: &AlignedVector,
    bundle: &ArtifactBundle,
) -> Result<(), ScoringError> {
    if vector.len() != bundle.feature_count() {
        error!(
            expected = bundle.feature_count(),
            actual = vector.len(),
            "Aligned vector does not match the classifier input"
        );
        return Err(ScoringError::ContractViolation {
            expected: bundle.feature_count(),
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::{sigmoid, Node, Tree, TreeEnsemble};
    use crate::models::scaler::StandardScaler;
    use crate::models::test_support::fixture_bundle;
    use crate::types::assessment::RiskLabel;
    use std::collections::BTreeMap;

    /// Single-feature bundle whose margin is `base + leaf(x)`.
    fn stump_bundle(base_score: f64, low_leaf: f64, high_leaf: f64) -> ArtifactBundle {
        let tree = Tree::new(vec![
            Node::Split {
                feature: 0,
                threshold: 0.0,
                yes: 1,
                no: 2,
                missing: 1,
                cover: 2.0,
            },
            Node::Leaf {
                value: low_leaf,
                cover: 1.0,
            },
            Node::Leaf {
                value: high_leaf,
                cover: 1.0,
            },
        ])
        .unwrap();

        ArtifactBundle::new(
            TreeEnsemble::new(base_score, None, vec![tree]).unwrap(),
            BTreeMap::new(),
            StandardScaler::new(vec![0.0], vec![1.0]).unwrap(),
            vec!["x".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_margin_is_low_risk() {
        // base 0.5 -> margin 0 -> probability exactly 0.5
        let bundle = stump_bundle(0.5, 0.0, 2.0);
        let scorer = RiskScorer::new();

        let at_boundary = scorer
            .score(&AlignedVector::from_values(vec![-1.0]), &bundle)
            .unwrap();
        assert_eq!(at_boundary.score, 0.5);
        assert_eq!(at_boundary.label, RiskLabel::Low);

        let above = scorer
            .score(&AlignedVector::from_values(vec![1.0]), &bundle)
            .unwrap();
        assert_eq!(above.label, RiskLabel::High);
        assert_eq!(above.score, (sigmoid(2.0) * 10_000.0).round() / 10_000.0);
    }

    #[test]
    fn test_probability_matches_classifier() {
        let bundle = fixture_bundle();
        let vector = AlignedVector::from_values(vec![0.0; 15]);

        let probability = RiskScorer::new().probability(&vector, &bundle).unwrap();
        assert_eq!(probability, bundle.classifier().predict_proba(&[0.0; 15]));
        assert!((0.0..=1.0).contains(&probability));
    }

    #[test]
    fn test_wrong_length_is_contract_violation() {
        let bundle = fixture_bundle();
        let err = RiskScorer::new()
            .score(&AlignedVector::from_values(vec![0.0; 14]), &bundle)
            .unwrap_err();

        assert_eq!(
            err,
            ScoringError::ContractViolation {
                expected: 15,
                actual: 14
            }
        );
        assert!(err.is_internal());
    }
}
