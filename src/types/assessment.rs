//! Risk assessment and explanation data structures

use serde::{Deserialize, Serialize};

/// Probability above which an applicant is labelled high risk.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Decimal places kept in the reported risk score.
pub const SCORE_DECIMALS: i32 = 4;

/// Thresholded risk decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Low Risk")]
    Low,
}

impl RiskLabel {
    /// Strict `>` comparison: exactly 0.5 is low risk.
    pub fn from_probability(probability: f64) -> Self {
        if probability > DECISION_THRESHOLD {
            RiskLabel::High
        } else {
            RiskLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::High => "High Risk",
            RiskLabel::Low => "Low Risk",
        }
    }
}

/// Score and label for one applicant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Default probability rounded to [`SCORE_DECIMALS`] places
    #[serde(rename = "risk_score")]
    pub score: f64,

    #[serde(rename = "risk_label")]
    pub label: RiskLabel,
}

impl RiskAssessment {
    /// Build an assessment from the classifier's raw default probability.
    ///
    /// The label is decided on the unrounded probability.
    pub fn from_probability(probability: f64) -> Self {
        let factor = 10f64.powi(SCORE_DECIMALS);
        Self {
            score: (probability * factor).round() / factor,
            label: RiskLabel::from_probability(probability),
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.label == RiskLabel::High
    }
}

/// Signed contribution of one feature to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    /// Aligned (encoded and scaled) value the model saw
    pub value: f64,
    /// Contribution to the raw model output relative to the baseline
    pub impact: f64,
}

/// Attributions ordered by descending absolute impact, truncated to top-k
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedExplanation(Vec<Attribution>);

impl RankedExplanation {
    /// Rank attributions by descending `|impact|` and keep the first `top_k`.
    ///
    /// The sort is stable, so equal magnitudes keep their input order.
    pub fn rank(mut attributions: Vec<Attribution>, top_k: usize) -> Self {
        attributions.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
        attributions.truncate(top_k);
        Self(attributions)
    }

    pub fn attributions(&self) -> &[Attribution] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribution> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Attribution> {
        self.0
    }
}

impl IntoIterator for RankedExplanation {
    type Item = Attribution;
    type IntoIter = std::vec::IntoIter<Attribution>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Score and explanation computed over the same aligned vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(flatten)]
    pub risk: RiskAssessment,
    pub explanation: RankedExplanation,
}

/// Failure category reported back to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Reply body for a failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}
