//! Credit Risk Pipeline - Main Entry Point
//!
//! Answers risk score and explanation requests over NATS request/reply.
//! Requests are processed in parallel up to `pipeline.workers` at a time.

use anyhow::{Context, Result};
use credit_risk_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{ArtifactBundle, FileArtifactSource},
    pipeline::CreditRiskPipeline,
    producer::ResponsePublisher,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Credit Risk Pipeline");
    info!(
        predict_subject = %config.nats.predict_subject,
        explain_subject = %config.nats.explain_subject,
        top_k = config.explain.top_k,
        "Configuration loaded successfully"
    );

    // Load artifacts; no traffic is accepted without a valid bundle
    let source = FileArtifactSource::from_config(&config.artifacts);
    let bundle = ArtifactBundle::from_source(&source)
        .with_context(|| format!("Failed to load artifacts from {}", source.dir().display()))?;

    // Initialize metrics and the scoring pipeline
    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = CreditRiskPipeline::new(Arc::new(bundle))
        .with_top_k(config.explain.top_k)
        .with_metrics(metrics.clone());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats);
    let publisher = ResponsePublisher::new(client.clone());

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    if config.pipeline.metrics_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
        tokio::spawn(reporter.start());
    }

    let mut requests = consumer.subscribe().await?;

    while let Some(request) = requests.next().await {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let pipeline = pipeline.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let operation = request.operation;
            let message = request.message;

            let Some(reply) = message.reply.clone() else {
                warn!(
                    subject = %message.subject,
                    operation = operation.as_str(),
                    "Request has no reply subject, dropping"
                );
                drop(permit);
                return;
            };

            let sent = match pipeline.handle(operation, &message.payload) {
                Ok(body) => {
                    debug!(operation = operation.as_str(), "Request answered");
                    publisher.respond(reply, body).await
                }
                Err(response) => {
                    warn!(
                        operation = operation.as_str(),
                        kind = response.kind.as_str(),
                        error = %response.error,
                        "Request failed"
                    );
                    publisher.respond_json(reply, &response).await
                }
            };

            if let Err(e) = sent {
                error!(
                    operation = operation.as_str(),
                    error = %e,
                    "Failed to publish reply"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    if logging.is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
