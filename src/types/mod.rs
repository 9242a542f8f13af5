//! Type definitions for the credit risk pipeline

pub mod applicant;
pub mod assessment;

pub use applicant::{ApplicantRequest, RawRecord, RawValue, APPLICANT_FIELDS};
pub use assessment::{
    Assessment, Attribution, ErrorKind, ErrorResponse, RankedExplanation, RiskAssessment,
    RiskLabel,
};
