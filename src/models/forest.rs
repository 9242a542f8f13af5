//! Gradient-boosted tree ensemble for binary default classification
//!
//! The ensemble is loaded from an XGBoost-style JSON tree dump
//! (`dump_format="json"`, `with_stats=True`): one nested node object per tree,
//! with split feature, `split_condition`, `yes`/`no`/`missing` child ids and the
//! `cover` statistic. Node covers drive both the explainer baseline and the
//! path-dependent attribution.
//!
//! Trees are flattened into an index arena where node `i` is the dump's
//! `nodeid == i` and node 0 is the root.

use crate::error::ArtifactLoadError;
use serde::{Deserialize, Serialize};

/// The only objective the scorer understands.
pub const BINARY_LOGISTIC: &str = "binary:logistic";

/// Node as it appears in the exported tree dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpNode {
    pub nodeid: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    /// Feature name (or `f<index>`) for split nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_condition: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<usize>,
    /// Leaf value for leaf nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<f64>,
    /// Training hessian mass that reached this node
    pub cover: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DumpNode>,
}

/// Persisted classifier artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub objective: String,
    /// Prior default probability the boosting started from
    pub base_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub trees: Vec<DumpNode>,
}

/// Relative slack allowed between a split's cover and the sum of its children's,
/// absorbing the rounding of covers printed in text dumps.
const COVER_TOLERANCE: f64 = 1e-6;

/// A flattened tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single regression tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree from flattened nodes, checking that it is well formed.
    pub fn new(nodes: Vec<Node>) -> Result<Self, String> {
        let tree = Self { nodes };
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        let mut parents = vec![0usize; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                yes,
                no,
                missing,
                cover,
                threshold,
                ..
            } = node
            else {
                continue;
            };

            if *yes >= self.nodes.len() || *no >= self.nodes.len() || *yes == *no {
                return Err(format!("node {} has invalid children {}/{}", id, yes, no));
            }
            if *missing != *yes && *missing != *no {
                return Err(format!("node {} routes missing values to {}", id, missing));
            }
            if !(*cover > 0.0) {
                return Err(format!("split node {} has non-positive cover", id));
            }
            if threshold.is_nan() {
                return Err(format!("split node {} has NaN threshold", id));
            }
            if *yes == 0 || *no == 0 {
                return Err(format!("node {} points back at the root", id));
            }
            let children_cover = self.nodes[*yes].cover() + self.nodes[*no].cover();
            if (children_cover - cover).abs() > COVER_TOLERANCE * cover {
                return Err(format!(
                    "split node {} has cover {} but its children cover {}",
                    id, cover, children_cover
                ));
            }
            parents[*yes] += 1;
            parents[*no] += 1;
        }

        // Every non-root node has exactly one parent, so traversal from the root
        // reaches a leaf.
        if let Some(id) = (1..self.nodes.len()).find(|&id| parents[id] != 1) {
            return Err(format!("node {} has {} parents", id, parents[id]));
        }

        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// Child taken for the given feature vector at a split node.
    pub fn next_node(&self, id: usize, features: &[f64]) -> usize {
        match &self.nodes[id] {
            Node::Split {
                feature,
                threshold,
                yes,
                no,
                missing,
                ..
            } => {
                let x = features[*feature];
                if x.is_nan() {
                    *missing
                } else if x < *threshold {
                    *yes
                } else {
                    *no
                }
            }
            Node::Leaf { .. } => id,
        }
    }

    /// Leaf value reached by `features`
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { .. } => id = self.next_node(id, features),
            }
        }
    }

    /// Cover-weighted mean leaf value over the training distribution.
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, id: usize) -> f64 {
        match &self.nodes[id] {
            Node::Leaf { value, .. } => *value,
            Node::Split { yes, no, cover, .. } => {
                let yes_cover = self.nodes[*yes].cover();
                let no_cover = self.nodes[*no].cover();
                (yes_cover * self.expected_from(*yes) + no_cover * self.expected_from(*no))
                    / cover
            }
        }
    }

    /// Largest feature index any split reads
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    pub fn depth(&self) -> usize {
        fn depth_from(tree: &Tree, id: usize) -> usize {
            match tree.node(id) {
                Node::Leaf { .. } => 0,
                Node::Split { yes, no, .. } => {
                    1 + depth_from(tree, *yes).max(depth_from(tree, *no))
                }
            }
        }
        depth_from(self, 0)
    }
}

/// Boosted binary classifier with a logistic link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEnsemble {
    objective: String,
    base_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
    trees: Vec<Tree>,
    #[serde(skip)]
    expected_margin: f64,
}

impl TreeEnsemble {
    /// Flatten and validate an exported model.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ArtifactLoadError> {
        if artifact.objective != BINARY_LOGISTIC {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "unsupported objective {:?}, expected {:?}",
                artifact.objective, BINARY_LOGISTIC
            )));
        }
        if !(artifact.base_score > 0.0 && artifact.base_score < 1.0) {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "base_score {} is not a probability in (0, 1)",
                artifact.base_score
            )));
        }

        let feature_names = artifact.feature_names;
        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, root)| {
                flatten_tree(root, feature_names.as_deref())
                    .and_then(Tree::new)
                    .map_err(|e| ArtifactLoadError::Inconsistent(format!("tree {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::assemble(artifact.base_score, feature_names, trees))
    }

    /// Build an ensemble from already flattened trees.
    pub fn new(
        base_score: f64,
        feature_names: Option<Vec<String>>,
        trees: Vec<Tree>,
    ) -> Result<Self, ArtifactLoadError> {
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "base_score {} is not a probability in (0, 1)",
                base_score
            )));
        }
        Ok(Self::assemble(base_score, feature_names, trees))
    }

    fn assemble(base_score: f64, feature_names: Option<Vec<String>>, trees: Vec<Tree>) -> Self {
        let base_margin = logit(base_score);
        let expected_margin = base_margin + trees.iter().map(Tree::expected_value).sum::<f64>();

        Self {
            objective: BINARY_LOGISTIC.to_string(),
            base_score,
            feature_names,
            trees,
            expected_margin,
        }
    }

    /// Raw log-odds output for one aligned vector.
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        self.base_margin() + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Probability of the default class.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_margin(features))
    }

    /// Margin the boosting started from
    pub fn base_margin(&self) -> f64 {
        logit(self.base_score)
    }

    /// Expected margin over the training distribution, weighted by node cover.
    pub fn expected_margin(&self) -> f64 {
        self.expected_margin
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Smallest input width every split can read
    pub fn min_feature_count(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature)
            .max()
            .map_or(0, |max| max + 1)
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

pub fn logit(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}

/// Resolve a split reference to a column index.
fn resolve_feature(split: &str, feature_names: Option<&[String]>) -> Option<usize> {
    if let Some(names) = feature_names {
        if let Some(index) = names.iter().position(|name| name == split) {
            return Some(index);
        }
    }
    split
        .strip_prefix('f')
        .and_then(|digits| digits.parse::<usize>().ok())
}

fn flatten_tree(root: DumpNode, feature_names: Option<&[String]>) -> Result<Vec<Node>, String> {
    let mut slots: Vec<Option<Node>> = Vec::new();
    let mut stack = vec![root];

    while let Some(dump) = stack.pop() {
        let id = dump.nodeid;
        let node = match (&dump.leaf, &dump.split) {
            (Some(value), None) => Node::Leaf {
                value: *value,
                cover: dump.cover,
            },
            (None, Some(split)) => {
                let feature = resolve_feature(split, feature_names)
                    .ok_or_else(|| format!("node {} splits on unknown feature {:?}", id, split))?;
                let (Some(threshold), Some(yes), Some(no)) =
                    (dump.split_condition, dump.yes, dump.no)
                else {
                    return Err(format!("split node {} is missing its condition or children", id));
                };

                let mut child_ids: Vec<usize> = dump.children.iter().map(|c| c.nodeid).collect();
                child_ids.sort_unstable();
                let mut expected = vec![yes, no];
                expected.sort_unstable();
                if child_ids != expected {
                    return Err(format!(
                        "split node {} lists children {:?} but routes to {:?}",
                        id, child_ids, expected
                    ));
                }

                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing: dump.missing.unwrap_or(yes),
                    cover: dump.cover,
                }
            }
            _ => return Err(format!("node {} must be either a leaf or a split", id)),
        };

        if slots.len() <= id {
            slots.resize(id + 1, None);
        }
        if slots[id].replace(node).is_some() {
            return Err(format!("node id {} appears twice", id));
        }
        stack.extend(dump.children);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.ok_or_else(|| format!("node id {} is missing", id)))
        .collect()
}

impl TryFrom<ModelArtifact> for TreeEnsemble {
    type Error = ArtifactLoadError;

    fn try_from(artifact: ModelArtifact) -> Result<Self, Self::Error> {
        Self::from_artifact(artifact)
    }
}
