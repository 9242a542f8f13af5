//! Performance metrics and statistics tracking for the credit risk pipeline.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const MAX_SAMPLES: usize = 10_000;

/// Operation a request was served by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Predict,
    Explain,
    /// Score and explanation together
    Assess,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Predict => "predict",
            Operation::Explain => "explain",
            Operation::Assess => "assess",
        }
    }
}

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total requests answered successfully
    pub requests_processed: AtomicU64,
    /// Scored requests labelled high risk
    pub high_risk: AtomicU64,
    /// Requests by operation
    requests_by_operation: RwLock<HashMap<Operation, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Unseen-category substitutions per feature
    fallbacks_by_feature: RwLock<BTreeMap<String, u64>>,
    /// Failed requests by error kind
    failures_by_kind: RwLock<BTreeMap<String, u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_processed: AtomicU64::new(0),
            high_risk: AtomicU64::new(0),
            requests_by_operation: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            fallbacks_by_feature: RwLock::new(BTreeMap::new()),
            failures_by_kind: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully answered request
    pub fn record_request(&self, operation: Operation, processing_time: Duration) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        *self.requests_by_operation.write().entry(operation).or_insert(0) += 1;

        let mut times = self.processing_times.write();
        times.push(processing_time.as_micros() as u64);
        if times.len() > MAX_SAMPLES {
            times.drain(0..MAX_SAMPLES / 2);
        }
    }

    /// Record a risk score and its label
    pub fn record_score(&self, risk_score: f64, high_risk: bool) {
        if high_risk {
            self.high_risk.fetch_add(1, Ordering::Relaxed);
        }

        let bucket = (risk_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        self.score_buckets.write()[bucket] += 1;
    }

    /// Record an unseen category replaced by its encoder's fallback
    pub fn record_fallback(&self, feature: &str) {
        *self
            .fallbacks_by_feature
            .write()
            .entry(feature.to_string())
            .or_insert(0) += 1;
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &str) {
        *self
            .failures_by_kind
            .write()
            .entry(kind.to_string())
            .or_insert(0) += 1;
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = self.processing_times.read().clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_requests(&self, operation: Operation) -> u64 {
        self.requests_by_operation
            .read()
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    pub fn get_fallbacks_by_feature(&self) -> BTreeMap<String, u64> {
        self.fallbacks_by_feature.read().clone()
    }

    pub fn get_failures_by_kind(&self) -> BTreeMap<String, u64> {
        self.failures_by_kind.read().clone()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let request_count = self.requests_processed.load(Ordering::Relaxed);
        let predict_count = self.get_requests(Operation::Predict);
        let explain_count = self.get_requests(Operation::Explain);
        let assess_count = self.get_requests(Operation::Assess);
        let scored_count = predict_count + assess_count;
        let high_risk_count = self.high_risk.load(Ordering::Relaxed);
        let high_risk_rate = if scored_count > 0 {
            (high_risk_count as f64 / scored_count as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let score_dist = self.get_score_distribution();
        let fallbacks = self.get_fallbacks_by_feature();
        let failures = self.get_failures_by_kind();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             CREDIT RISK PIPELINE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Processed: {:>8}  │  Throughput: {:>6.1} req/s    ║",
            request_count, throughput
        );
        info!(
            "║ Predict: {:>8}  Explain: {:>8}  Assess: {:>8}          ║",
            predict_count, explain_count, assess_count
        );
        info!(
            "║ High Risk: {:>5.1}% of scored requests                        ║",
            high_risk_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        if !fallbacks.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Unseen Category Fallbacks:                                   ║");
            for (feature, count) in &fallbacks {
                info!("║   {:24}: {:>8}", feature, count);
            }
        }
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures:                                                    ║");
            for (kind, count) in &failures {
                info!("║   {:24}: {:>8}", kind, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, PartialEq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
