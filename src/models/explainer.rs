//! Additive feature attribution for the tree ensemble
//!
//! Implements path-dependent TreeSHAP: exact Shapley values of the
//! cover-weighted conditional expectation of each tree, computed in
//! `O(leaves * depth^2)` per tree. Attributions explain the raw margin
//! (log-odds), so for every instance
//!
//! ```text
//! expected_margin + sum(impacts) == predict_margin(x)
//! ```
//!
//! up to floating point error.

use crate::error::ScoringError;
use crate::feature_aligner::AlignedVector;
use crate::models::bundle::ArtifactBundle;
use crate::models::forest::{Node, Tree};
use crate::models::inference::check_shape;
use crate::types::assessment::{Attribution, RankedExplanation};
use tracing::debug;

/// Default number of attributions returned by [`AttributionEngine::explain`].
pub const DEFAULT_TOP_K: usize = 5;

/// Full, untruncated decomposition of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Contributions {
    /// Expected model margin over the training distribution
    pub baseline: f64,
    /// One impact per feature, in feature order
    pub impacts: Vec<f64>,
}

impl Contributions {
    /// Baseline plus every impact; reconstructs the model margin.
    pub fn total(&self) -> f64 {
        self.baseline + self.impacts.iter().sum::<f64>()
    }
}

/// Computes and ranks per-feature contributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributionEngine;

impl AttributionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Shapley contribution of every feature to the margin for `vector`.
    pub fn contributions(
        &self,
        vector: &AlignedVector,
        bundle: &ArtifactBundle,
    ) -> Result<Contributions, ScoringError> {
        check_shape(vector, bundle)?;

        let features = vector.as_slice();
        let mut impacts = vec![0.0; features.len()];
        for tree in bundle.classifier().trees() {
            tree_shap(tree, features, &mut impacts);
        }

        Ok(Contributions {
            baseline: bundle.classifier().expected_margin(),
            impacts,
        })
    }

    /// Top `top_k` attributions by absolute impact.
    ///
    /// Equal magnitudes keep feature-order position.
    pub fn explain(
        &self,
        vector: &AlignedVector,
        bundle: &ArtifactBundle,
        top_k: usize,
    ) -> Result<RankedExplanation, ScoringError> {
        let contributions = self.contributions(vector, bundle)?;

        let attributions = bundle
            .feature_order()
            .iter()
            .zip(vector.as_slice())
            .zip(&contributions.impacts)
            .map(|((feature, value), impact)| Attribution {
                feature: feature.clone(),
                value: *value,
                impact: *impact,
            })
            .collect();

        let ranked = RankedExplanation::rank(attributions, top_k);

        debug!(
            baseline = contributions.baseline,
            top_feature = ranked.attributions().first().map(|a| a.feature.as_str()),
            returned = ranked.len(),
            "Explained applicant"
        );

        Ok(ranked)
    }
}

/// One entry of the feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature index, or `None` for the root sentinel
    feature: Option<usize>,
    /// Fraction of training cover that flows down this path when the feature is unknown
    zero_fraction: f64,
    /// 1 if `x` follows this path when the feature is known, else 0
    one_fraction: f64,
    /// Weight of subsets of each size on the path
    weight: f64,
}

fn tree_shap(tree: &Tree, features: &[f64], impacts: &mut [f64]) {
    recurse(tree, 0, features, impacts, &[], 0, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    node_id: usize,
    features: &[f64],
    impacts: &mut [f64],
    parent_path: &[PathElement],
    mut unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path: Vec<PathElement> = parent_path[..unique_depth].to_vec();
    extend_path(&mut path, unique_depth, zero_fraction, one_fraction, feature);

    match tree.node(node_id) {
        Node::Leaf { value, .. } => {
            for i in 1..=unique_depth {
                let weight = unwound_path_sum(&path, unique_depth, i);
                let element = path[i];
                if let Some(index) = element.feature {
                    impacts[index] +=
                        weight * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split_feature,
            yes,
            no,
            cover,
            ..
        } => {
            let hot = tree.next_node(node_id, features);
            let cold = if hot == *yes { *no } else { *yes };
            let hot_zero_fraction = tree.node(hot).cover() / cover;
            let cold_zero_fraction = tree.node(cold).cover() / cover;

            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;

            // A feature seen earlier on the path is undone first so that each
            // feature appears at most once.
            if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(*split_feature)) {
                incoming_zero_fraction = path[k].zero_fraction;
                incoming_one_fraction = path[k].one_fraction;
                unwind_path(&mut path, unique_depth, k);
                unique_depth -= 1;
            }

            recurse(
                tree,
                hot,
                features,
                impacts,
                &path,
                unique_depth + 1,
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(*split_feature),
            );
            recurse(
                tree,
                cold,
                features,
                impacts,
                &path,
                unique_depth + 1,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                Some(*split_feature),
            );
        }
    }
}

/// Append a feature to the path and update subset weights.
///
/// `path.len() == unique_depth` on entry.
fn extend_path(
    path: &mut Vec<PathElement>,
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if unique_depth == 0 { 1.0 } else { 0.0 },
    });

    let depth = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let position = i as f64;
        path[i + 1].weight += one_fraction * path[i].weight * (position + 1.0) / (depth + 1.0);
        path[i].weight = zero_fraction * path[i].weight * (depth - position) / (depth + 1.0);
    }
}

/// Remove element `path_index` from the path, undoing its weight update.
fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].weight;

    for i in (0..unique_depth).rev() {
        let position = i as f64;
        if one_fraction != 0.0 {
            let previous = path[i].weight;
            path[i].weight = next_one_portion * (depth + 1.0) / ((position + 1.0) * one_fraction);
            next_one_portion =
                previous - path[i].weight * zero_fraction * (depth - position) / (depth + 1.0);
        } else {
            path[i].weight = path[i].weight * (depth + 1.0) / (zero_fraction * (depth - position));
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total subset weight the path would have with element `path_index` removed.
fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].weight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let position = i as f64;
        if one_fraction != 0.0 {
            let portion = next_one_portion * (depth + 1.0) / ((position + 1.0) * one_fraction);
            total += portion;
            next_one_portion =
                path[i].weight - portion * zero_fraction * ((depth - position) / (depth + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].weight / zero_fraction) / ((depth - position) / (depth + 1.0));
        }
    }

    total
}
