//! Credit Risk Pipeline Library
//!
//! Scores loan applicants for default risk and explains each score with the
//! features that contributed most, from a frozen bundle of trained artifacts.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_aligner;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactLoadError, ScoringError};
pub use feature_aligner::{AlignedVector, FeatureAligner};
pub use models::{ArtifactBundle, AttributionEngine, RiskScorer};
pub use pipeline::CreditRiskPipeline;
pub use producer::ResponsePublisher;
pub use types::{ApplicantRequest, Assessment, RankedExplanation, RawRecord, RiskAssessment};
