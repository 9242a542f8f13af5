//! Feature alignment for credit risk model inference.
//!
//! Rebuilds, from a loosely-typed applicant record, the exact numeric vector the
//! classifier was trained on: canonical column order, label-encoded categoricals
//! and standardized values.

use crate::error::ScoringError;
use crate::models::{ArtifactBundle, CategoricalEncoder};
use crate::types::applicant::{RawRecord, RawValue};
use serde::Serialize;

/// Label of a supplied but non-numeric float (NaN), as the training data
/// stringified missing entries. Absent fields never reach the encoder.
pub const MISSING_CATEGORY: &str = "nan";

/// Numeric feature vector in the bundle's canonical order and scaled basis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AlignedVector {
    values: Vec<f64>,
}

impl AlignedVector {
    /// Wrap raw values. Intended for tooling and tests; requests go through
    /// [`FeatureAligner::align`].
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

/// An unseen category that was replaced by the encoder's fallback class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFallback {
    pub feature: String,
    /// Label as received
    pub label: String,
    /// Class substituted for it
    pub substituted: String,
}

/// Aligned vector plus the fallbacks applied while building it
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub vector: AlignedVector,
    pub fallbacks: Vec<CategoryFallback>,
}

/// Converts raw records into model input vectors.
///
/// Pure function of record and bundle: iteration follows the bundle's feature
/// order, never the record's key order, and extra record fields are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureAligner;

impl FeatureAligner {
    pub fn new() -> Self {
        Self
    }

    /// Align a record, discarding the fallback report.
    pub fn align(
        &self,
        record: &RawRecord,
        bundle: &ArtifactBundle,
    ) -> Result<AlignedVector, ScoringError> {
        self.align_with_report(record, bundle).map(|a| a.vector)
    }

    /// Align a record and report every unseen category substituted on the way.
    pub fn align_with_report(
        &self,
        record: &RawRecord,
        bundle: &ArtifactBundle,
    ) -> Result<Alignment, ScoringError> {
        let mut values = Vec::with_capacity(bundle.feature_count());
        let mut fallbacks = Vec::new();

        for feature in bundle.feature_order() {
            let raw = record.get(feature);
            let value = match bundle.encoder(feature) {
                Some(encoder) => {
                    let (code, fallback) = encode_category(feature, raw, encoder);
                    fallbacks.extend(fallback);
                    code as f64
                }
                None => numeric_value(feature, raw)?,
            };
            values.push(value);
        }

        bundle.scaler().transform_in_place(&mut values);

        Ok(Alignment {
            vector: AlignedVector { values },
            fallbacks,
        })
    }
}

/// Resolve a categorical value to its code, substituting the fallback class for
/// labels the encoder never saw.
///
/// An absent field takes the fallback code without being reported: only a
/// supplied label the encoder does not know counts as a fallback.
fn encode_category(
    feature: &str,
    raw: Option<&RawValue>,
    encoder: &CategoricalEncoder,
) -> (u32, Option<CategoryFallback>) {
    let Some(raw) = raw else {
        return (encoder.fallback_code(), None);
    };
    let label = category_label(raw);
    match encoder.encode(&label) {
        Ok(code) => (code, None),
        Err(unseen) => (
            encoder.fallback_code(),
            Some(CategoryFallback {
                feature: feature.to_string(),
                label: unseen.label,
                substituted: encoder.fallback_class().to_string(),
            }),
        ),
    }
}

/// String form of a raw value, matching how training labels were stringified.
pub fn category_label(raw: &RawValue) -> String {
    match raw {
        RawValue::Null => MISSING_CATEGORY.to_string(),
        RawValue::Text(text) => text.clone(),
        RawValue::Integer(value) => value.to_string(),
        RawValue::Float(value) => float_label(*value),
    }
}

/// Shortest round-trip form of a float: positional for decimal exponents in
/// `-4..16`, otherwise `1.5e+16` / `1e-05` style.
fn float_label(value: f64) -> String {
    if value.is_nan() {
        return MISSING_CATEGORY.to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        if value.fract() == 0.0 {
            format!("{:.1}", value)
        } else {
            value.to_string()
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn numeric_value(feature: &str, raw: Option<&RawValue>) -> Result<f64, ScoringError> {
    match raw {
        None | Some(RawValue::Null) => Ok(0.0),
        Some(RawValue::Integer(value)) => Ok(*value as f64),
        Some(RawValue::Float(value)) => Ok(*value),
        Some(RawValue::Text(text)) => {
            text.trim()
                .parse::<f64>()
                .map_err(|_| ScoringError::InvalidField {
                    feature: feature.to_string(),
                    value: text.clone(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::fixture_bundle;

    fn sample_record() -> RawRecord {
        RawRecord::new()
            .with("NAME_CONTRACT_TYPE", "Cash loans")
            .with("CODE_GENDER", "M")
            .with("FLAG_OWN_CAR", "N")
            .with("AMT_INCOME_TOTAL", 202500.0)
            .with("AMT_CREDIT", 406597.5)
            .with("NAME_INCOME_TYPE", "Working")
            .with("NAME_EDUCATION_TYPE", "Higher education")
            .with("OCCUPATION_TYPE", "Laborers")
            .with("CNT_CHILDREN", 0)
            .with("DAYS_BIRTH", -12005)
            .with("DAYS_EMPLOYED", -4542)
            .with("EXT_SOURCE_1", 0.1)
            .with("EXT_SOURCE_2", 0.4)
            .with("EXT_SOURCE_3", 0.5)
            .with("REGION_RATING_CLIENT", 2)
    }

    #[test]
    fn test_alignment_shape_and_values() {
        let bundle = fixture_bundle();
        let vector = FeatureAligner::new().align(&sample_record(), &bundle).unwrap();

        assert_eq!(vector.len(), bundle.feature_count());
        // CODE_GENDER "M" -> code 1, standardized
        let gender = (1.0 - 0.3417) / 0.4745;
        assert_eq!(vector.get(1), Some(gender));
        // EXT_SOURCE_3 passes straight to the scaler
        assert_eq!(vector.get(13), Some((0.5 - 0.5156) / 0.1748));
    }

    #[test]
    fn test_alignment_is_deterministic() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();
        let first = aligner.align(&sample_record(), &bundle).unwrap();
        let second = aligner.align(&sample_record(), &bundle).unwrap();

        let first_bits: Vec<u64> = first.as_slice().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u64> = second.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_unseen_category_uses_fallback() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let unseen = sample_record().with("NAME_INCOME_TYPE", "Astronaut");
        let fallback = sample_record().with("NAME_INCOME_TYPE", "Businessman");

        let report = aligner.align_with_report(&unseen, &bundle).unwrap();
        assert_eq!(report.vector, aligner.align(&fallback, &bundle).unwrap());
        assert_eq!(
            report.fallbacks,
            vec![CategoryFallback {
                feature: "NAME_INCOME_TYPE".to_string(),
                label: "Astronaut".to_string(),
                substituted: "Businessman".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_numeric_defaults_to_zero() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let mut missing = sample_record();
        missing.remove("AMT_CREDIT");
        let zero = sample_record().with("AMT_CREDIT", 0.0);

        assert_eq!(
            aligner.align(&missing, &bundle).unwrap(),
            aligner.align(&zero, &bundle).unwrap()
        );
    }

    #[test]
    fn test_missing_categorical_takes_fallback_class() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let mut missing = sample_record();
        missing.remove("CODE_GENDER");
        let fallback = sample_record().with("CODE_GENDER", "F");

        let report = aligner.align_with_report(&missing, &bundle).unwrap();
        assert_eq!(report.vector, aligner.align(&fallback, &bundle).unwrap());
        assert!(report.fallbacks.is_empty());
    }

    #[test]
    fn test_missing_categorical_ignores_nan_class() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        // OCCUPATION_TYPE knows "nan", but an omitted field is still class 0
        let sparse = RawRecord::new()
            .with("CODE_GENDER", "M")
            .with("EXT_SOURCE_2", 0.4);
        let fallback = sparse.clone().with("OCCUPATION_TYPE", "Accountants");
        let explicit_nan = sparse.clone().with("OCCUPATION_TYPE", "nan");

        let report = aligner.align_with_report(&sparse, &bundle).unwrap();
        assert!(report.fallbacks.is_empty());
        assert_eq!(report.vector, aligner.align(&fallback, &bundle).unwrap());
        assert_ne!(report.vector, aligner.align(&explicit_nan, &bundle).unwrap());

        let nulled = sparse.clone().with("OCCUPATION_TYPE", RawValue::Null);
        assert_eq!(report.vector, aligner.align(&nulled, &bundle).unwrap());
    }

    #[test]
    fn test_null_equals_absent() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let nulled = sample_record().with("EXT_SOURCE_1", RawValue::Null);
        let mut absent = sample_record();
        absent.remove("EXT_SOURCE_1");

        assert_eq!(
            aligner.align(&nulled, &bundle).unwrap(),
            aligner.align(&absent, &bundle).unwrap()
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let extra = sample_record()
            .with("SK_ID_CURR", 100002)
            .with("NAME_HOUSING_TYPE", "House / apartment");

        assert_eq!(
            aligner.align(&extra, &bundle).unwrap(),
            aligner.align(&sample_record(), &bundle).unwrap()
        );
    }

    #[test]
    fn test_numeric_text_is_parsed_or_rejected() {
        let bundle = fixture_bundle();
        let aligner = FeatureAligner::new();

        let textual = sample_record().with("AMT_CREDIT", " 406597.5 ");
        assert_eq!(
            aligner.align(&textual, &bundle).unwrap(),
            aligner.align(&sample_record(), &bundle).unwrap()
        );

        let garbage = sample_record().with("AMT_CREDIT", "a lot");
        assert_eq!(
            aligner.align(&garbage, &bundle).unwrap_err(),
            ScoringError::InvalidField {
                feature: "AMT_CREDIT".to_string(),
                value: "a lot".to_string(),
            }
        );
    }

    #[test]
    fn test_category_label_coercion() {
        assert_eq!(category_label(&RawValue::Null), "nan");
        assert_eq!(category_label(&RawValue::Integer(2)), "2");
        assert_eq!(category_label(&RawValue::Float(2.0)), "2.0");
        assert_eq!(category_label(&RawValue::Float(0.25)), "0.25");
        assert_eq!(category_label(&RawValue::Float(f64::NAN)), "nan");
        assert_eq!(category_label(&RawValue::from("Y")), "Y");
    }

    #[test]
    fn test_float_label_exponent_ranges() {
        assert_eq!(float_label(0.0001), "0.0001");
        assert_eq!(float_label(1e-5), "1e-05");
        assert_eq!(float_label(-2.5e-7), "-2.5e-07");
        assert_eq!(float_label(123456789012345.0), "123456789012345.0");
        assert_eq!(float_label(1e15), "1000000000000000.0");
        assert_eq!(float_label(1e16), "1e+16");
        assert_eq!(float_label(1.5e16), "1.5e+16");
        assert_eq!(float_label(1e100), "1e+100");
        assert_eq!(float_label(-0.0), "-0.0");
        assert_eq!(float_label(f64::NEG_INFINITY), "-inf");
    }
}
