//! Golden Fixture Freezer
//!
//! Loads an artifact bundle, scores and explains one applicant, and prints the
//! result as the golden fixture JSON that regression tests diff against.
//!
//! Usage: freeze-golden [ARTIFACTS_DIR] [RECORD_JSON]

use anyhow::{Context, Result};
use credit_risk_pipeline::{
    feature_aligner::FeatureAligner,
    models::{
        explainer::DEFAULT_TOP_K, ArtifactBundle, AttributionEngine, FileArtifactSource,
        RiskScorer,
    },
    types::{Attribution, RawRecord},
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Serialize)]
struct Golden {
    record: serde_json::Value,
    risk_score: f64,
    risk_label: &'static str,
    probability: f64,
    margin: f64,
    expected_value: f64,
    top_attributions: Vec<Attribution>,
}

fn sample_record() -> serde_json::Value {
    json!({
        "NAME_CONTRACT_TYPE": "Cash loans",
        "CODE_GENDER": "M",
        "FLAG_OWN_CAR": "N",
        "AMT_INCOME_TOTAL": 202500.0,
        "AMT_CREDIT": 406597.5,
        "NAME_INCOME_TYPE": "Working",
        "NAME_EDUCATION_TYPE": "Higher education",
        "OCCUPATION_TYPE": "Laborers",
        "CNT_CHILDREN": 0,
        "DAYS_BIRTH": -12005,
        "DAYS_EMPLOYED": -4542,
        "EXT_SOURCE_1": 0.1,
        "EXT_SOURCE_2": 0.4,
        "EXT_SOURCE_3": 0.5,
        "REGION_RATING_CLIENT": 2
    })
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the fixture
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("freeze_golden=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let artifacts_dir = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("tests/fixtures/artifacts");

    let record_json = match args.get(2) {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read record from {}", path))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid record JSON in {}", path))?
        }
        None => sample_record(),
    };
    let record: RawRecord =
        serde_json::from_value(record_json.clone()).context("Record must be a flat JSON object")?;

    let bundle = ArtifactBundle::from_source(&FileArtifactSource::new(artifacts_dir))
        .with_context(|| format!("Failed to load artifacts from {}", artifacts_dir))?;
    info!(fingerprint = %bundle.fingerprint(), "Bundle loaded");

    let vector = FeatureAligner::new().align(&record, &bundle)?;
    let probability = RiskScorer::new().probability(&vector, &bundle)?;
    let assessment = RiskScorer::new().score(&vector, &bundle)?;
    let engine = AttributionEngine::new();
    let contributions = engine.contributions(&vector, &bundle)?;
    let explanation = engine.explain(&vector, &bundle, DEFAULT_TOP_K)?;

    let margin = bundle.classifier().predict_margin(vector.as_slice());
    info!(
        margin = margin,
        reconstructed = contributions.total(),
        "Additivity check"
    );

    let golden = Golden {
        record: record_json,
        risk_score: assessment.score,
        risk_label: assessment.label.as_str(),
        probability,
        margin,
        expected_value: contributions.baseline,
        top_attributions: explanation.into_inner(),
    };

    println!("{}", serde_json::to_string_pretty(&golden)?);
    Ok(())
}
