//! Request-scoped facade over the alignment, scoring and explanation stages

use crate::error::ScoringError;
use crate::feature_aligner::{Alignment, CategoryFallback, FeatureAligner};
use crate::metrics::{Operation, PipelineMetrics};
use crate::models::explainer::DEFAULT_TOP_K;
use crate::models::{ArtifactBundle, AttributionEngine, RiskScorer};
use crate::types::applicant::{ApplicantRequest, RawRecord};
use crate::types::assessment::{
    Assessment, ErrorKind, ErrorResponse, RankedExplanation, RiskAssessment,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Shared, cheaply cloneable handle serving `predict` and `explain`.
#[derive(Clone)]
pub struct CreditRiskPipeline {
    bundle: Arc<ArtifactBundle>,
    aligner: FeatureAligner,
    scorer: RiskScorer,
    explainer: AttributionEngine,
    top_k: usize,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl CreditRiskPipeline {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self {
            bundle,
            aligner: FeatureAligner::new(),
            scorer: RiskScorer::new(),
            explainer: AttributionEngine::new(),
            top_k: DEFAULT_TOP_K,
            metrics: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Risk score and label for one applicant.
    pub fn predict(&self, record: &RawRecord) -> Result<RiskAssessment, ScoringError> {
        let start = Instant::now();
        let result = self
            .align(record)
            .and_then(|alignment| self.scorer.score(&alignment.vector, &self.bundle));

        if let Ok(assessment) = &result {
            self.record_score(assessment);
        }
        self.record_outcome(Operation::Predict, start, &result);
        result
    }

    /// Top contributing features for one applicant.
    pub fn explain(&self, record: &RawRecord) -> Result<RankedExplanation, ScoringError> {
        let start = Instant::now();
        let result = self.align(record).and_then(|alignment| {
            self.explainer
                .explain(&alignment.vector, &self.bundle, self.top_k)
        });

        self.record_outcome(Operation::Explain, start, &result);
        result
    }

    /// Score and explanation from a single aligned vector.
    pub fn assess(&self, record: &RawRecord) -> Result<Assessment, ScoringError> {
        let start = Instant::now();
        let result = self.align(record).and_then(|alignment| {
            let risk = self.scorer.score(&alignment.vector, &self.bundle)?;
            let explanation = self
                .explainer
                .explain(&alignment.vector, &self.bundle, self.top_k)?;
            Ok(Assessment { risk, explanation })
        });

        if let Ok(assessment) = &result {
            self.record_score(&assessment.risk);
        }
        self.record_outcome(Operation::Assess, start, &result);
        result
    }

    /// Decode a JSON request body, run `operation` and encode the reply body.
    ///
    /// Failures come back as an [`ErrorResponse`] ready to send to the caller.
    pub fn handle(&self, operation: Operation, payload: &[u8]) -> Result<Vec<u8>, ErrorResponse> {
        let request: ApplicantRequest = serde_json::from_slice(payload).map_err(|e| {
            self.record_failure(ErrorKind::InvalidRequest);
            ErrorResponse::new(
                ErrorKind::InvalidRequest,
                format!("malformed applicant request: {}", e),
            )
        })?;
        let record = request.into_record();

        match operation {
            Operation::Predict => self.predict(&record).map_err(reject).and_then(|r| encode(&r)),
            Operation::Explain => self.explain(&record).map_err(reject).and_then(|r| encode(&r)),
            Operation::Assess => self.assess(&record).map_err(reject).and_then(|r| encode(&r)),
        }
    }

    fn align(&self, record: &RawRecord) -> Result<Alignment, ScoringError> {
        let alignment = self.aligner.align_with_report(record, &self.bundle)?;
        for fallback in &alignment.fallbacks {
            self.report_fallback(fallback);
        }
        Ok(alignment)
    }

    fn report_fallback(&self, fallback: &CategoryFallback) {
        warn!(
            feature = %fallback.feature,
            label = %fallback.label,
            substituted = %fallback.substituted,
            "Unseen category replaced by fallback class"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_fallback(&fallback.feature);
        }
    }

    fn record_score(&self, assessment: &RiskAssessment) {
        if let Some(metrics) = &self.metrics {
            metrics.record_score(assessment.score, assessment.is_high_risk());
        }
    }

    fn record_outcome<T>(
        &self,
        operation: Operation,
        start: Instant,
        result: &Result<T, ScoringError>,
    ) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(_) => metrics.record_request(operation, start.elapsed()),
            Err(e) => metrics.record_failure(e.kind().as_str()),
        }
    }

    fn record_failure(&self, kind: ErrorKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(kind.as_str());
        }
    }
}

fn reject(err: ScoringError) -> ErrorResponse {
    if err.is_internal() {
        error!(error = %err, "Internal scoring failure");
    }
    ErrorResponse::new(err.kind(), err.to_string())
}

fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>, ErrorResponse> {
    serde_json::to_vec(body).map_err(|e| {
        error!(error = %e, "Failed to encode reply");
        ErrorResponse::new(ErrorKind::Internal, "failed to encode reply")
    })
}
