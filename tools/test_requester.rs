//! Test Applicant Requester
//!
//! Generates applicant requests, sends them to the pipeline over NATS
//! request/reply and logs the replies.
//!
//! Usage: test-requester [NATS_URL] [predict|explain] [COUNT] [RISKY_RATE] [DELAY_MS]
//!
//! The URL and subjects default to the service configuration, so
//! `CREDIT_RISK__NATS__*` overrides apply to both sides.

use credit_risk_pipeline::config::{AppConfig, NatsConfig};
use credit_risk_pipeline::types::ApplicantRequest;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Applicant generator for testing
struct ApplicantGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ApplicantGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Established borrower with stable employment and good bureau scores
    fn generate_typical(&mut self) -> ApplicantRequest {
        let income = self.rng.gen_range(90_000.0..400_000.0_f64).round();
        ApplicantRequest {
            name_contract_type: Some(self.random_choice(&["Cash loans", "Revolving loans"]).to_string()),
            code_gender: Some(self.random_choice(&["F", "M"]).to_string()),
            flag_own_car: Some(self.random_choice(&["N", "Y"]).to_string()),
            amt_income_total: Some(income),
            amt_credit: Some((income * self.rng.gen_range(1.0..3.0)).round()),
            name_income_type: Some(
                self.random_choice(&["Working", "Commercial associate", "State servant"])
                    .to_string(),
            ),
            name_education_type: Some(
                self.random_choice(&["Higher education", "Secondary / secondary special"])
                    .to_string(),
            ),
            occupation_type: Some(
                self.random_choice(&["Core staff", "Managers", "Accountants", "IT staff"])
                    .to_string(),
            ),
            cnt_children: Some(self.rng.gen_range(0..3)),
            days_birth: Some(-self.rng.gen_range(11_000..22_000)),
            days_employed: Some(-self.rng.gen_range(1_500..9_000)),
            ext_source_1: Some(self.rng.gen_range(0.4..0.9)),
            ext_source_2: Some(self.rng.gen_range(0.5..0.8)),
            ext_source_3: Some(self.rng.gen_range(0.5..0.85)),
            region_rating_client: Some(self.rng.gen_range(1..3)),
        }
    }

    /// Young, short employment, weak bureau scores, some fields missing
    fn generate_risky(&mut self) -> ApplicantRequest {
        let income = self.rng.gen_range(30_000.0..120_000.0_f64).round();
        ApplicantRequest {
            name_contract_type: Some("Cash loans".to_string()),
            code_gender: Some(self.random_choice(&["F", "M"]).to_string()),
            flag_own_car: Some("N".to_string()),
            amt_income_total: Some(income),
            amt_credit: Some((income * self.rng.gen_range(3.0..8.0)).round()),
            name_income_type: Some(self.random_choice(&["Working", "Unemployed"]).to_string()),
            name_education_type: Some(
                self.random_choice(&["Secondary / secondary special", "Lower secondary"])
                    .to_string(),
            ),
            occupation_type: None,
            cnt_children: Some(self.rng.gen_range(0..5)),
            days_birth: Some(-self.rng.gen_range(7_500..10_000)),
            days_employed: Some(-self.rng.gen_range(0..400)),
            ext_source_1: None,
            ext_source_2: Some(self.rng.gen_range(0.0..0.25)),
            ext_source_3: Some(self.rng.gen_range(0.0..0.3)),
            region_rating_client: Some(3),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }

    fn generate(&mut self, risky_rate: f64) -> (ApplicantRequest, bool) {
        if self.rng.gen_bool(risky_rate) {
            (self.generate_risky(), true)
        } else {
            (self.generate_typical(), false)
        }
    }
}

/// Subject the service answers `operation` on
fn subject_for<'a>(operation: &str, nats: &'a NatsConfig) -> anyhow::Result<&'a str> {
    match operation {
        "predict" => Ok(&nats.predict_subject),
        "explain" => Ok(&nats.explain_subject),
        other => anyhow::bail!("Unknown operation '{}', expected predict or explain", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Applicant Requester");

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load configuration, using defaults");
        AppConfig::default()
    });

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or(&config.nats.url);
    let operation = args.get(2).map(|s| s.as_str()).unwrap_or("predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let risky_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.2_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    let subject = subject_for(operation, &config.nats)?;

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        risky_rate = risky_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, risky_rate, delay_ms).await;
        }
    };

    let mut generator = ApplicantGenerator::new();
    let mut typical_count = 0;
    let mut risky_count = 0;
    let mut failed_count = 0;
    let mut total_latency = Duration::ZERO;

    info!("Sending {} requests...", count);

    for i in 0..count {
        let (applicant, risky) = generator.generate(risky_rate);
        if risky {
            risky_count += 1;
        } else {
            typical_count += 1;
        }

        let payload = serde_json::to_vec(&applicant)?;
        let start = Instant::now();

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                total_latency += start.elapsed();
                let body = String::from_utf8_lossy(&reply.payload);
                if (i + 1) % 10 == 0 || i == 0 {
                    info!(
                        request = i + 1,
                        risky_profile = risky,
                        latency_us = start.elapsed().as_micros() as u64,
                        "Reply: {}",
                        body
                    );
                }
            }
            Err(e) => {
                failed_count += 1;
                warn!(request = i + 1, error = %e, "Request failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let answered = count - failed_count;
    let avg_latency_us = if answered > 0 {
        total_latency.as_micros() as u64 / answered
    } else {
        0
    };
    info!(
        "Completed! Sent {} requests ({} typical, {} risky), {} failed, avg latency {} us",
        count, typical_count, risky_count, failed_count, avg_latency_us
    );

    Ok(())
}

async fn run_dry_mode(count: u64, risky_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ApplicantGenerator::new();

    for i in 0..count {
        let (applicant, _) = generator.generate(risky_rate);
        let json = serde_json::to_string_pretty(&applicant)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample applicant {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_follow_configuration() {
        let mut nats = AppConfig::default().nats;
        nats.predict_subject = "staging.risk.predict".to_string();
        nats.explain_subject = "staging.risk.explain".to_string();

        assert_eq!(subject_for("predict", &nats).unwrap(), "staging.risk.predict");
        assert_eq!(subject_for("explain", &nats).unwrap(), "staging.risk.explain");
        assert!(subject_for("assess", &nats).is_err());
    }

    #[test]
    fn test_generated_applicants_serialize() {
        let mut generator = ApplicantGenerator::new();
        let risky = serde_json::to_value(generator.generate_risky()).unwrap();
        assert!(risky.get("OCCUPATION_TYPE").map_or(true, |v| v.is_null()));
        assert!(serde_json::to_vec(&generator.generate_typical()).is_ok());
    }
}
