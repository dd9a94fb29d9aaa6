//! Performance metrics and statistics tracking for the prediction service.

use crate::types::prediction::{PredictionResult, Verdict};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for request handling
pub struct ServingMetrics {
    /// Requests answered with a verdict
    pub requests_served: AtomicU64,
    /// Requests whose input failed normalization
    pub requests_rejected: AtomicU64,
    /// Requests where the pipeline failed
    pub requests_failed: AtomicU64,
    /// Verdict counts
    verdicts: RwLock<HashMap<Verdict, u64>>,
    /// Rejections by error kind
    rejections_by_kind: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Disease probability distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServingMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            verdicts: RwLock::new(HashMap::new()),
            rejections_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, result: &PredictionResult) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut verdicts) = self.verdicts.write() {
            *verdicts.entry(result.verdict).or_insert(0) += 1;
        }

        if let Some(confidence) = result.confidence {
            let bucket = ((confidence.heart_disease / 10.0) as usize).min(9);
            if let Ok(mut buckets) = self.confidence_buckets.write() {
                buckets[bucket] += 1;
            }
        }
    }

    /// Record a request rejected during normalization
    pub fn record_rejection(&self, processing_time: Duration, kind: &str) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut by_kind) = self.rejections_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a pipeline failure
    pub fn record_failure(&self, processing_time: Duration) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);
    }

    /// Total requests seen, whatever the outcome
    pub fn total_requests(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
            + self.requests_rejected.load(Ordering::Relaxed)
            + self.requests_failed.load(Ordering::Relaxed)
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get disease probability distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Get verdict counts
    pub fn get_verdicts(&self) -> HashMap<Verdict, u64> {
        self.verdicts
            .read()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Get rejection counts by error kind
    pub fn get_rejections_by_kind(&self) -> HashMap<String, u64> {
        self.rejections_by_kind
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let served = self.requests_served.load(Ordering::Relaxed);
        let rejected = self.requests_rejected.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let total = self.total_requests();
        let reject_rate = if total > 0 {
            (rejected as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let verdicts = self.get_verdicts();
        let rejections = self.get_rejections_by_kind();
        let distribution = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          HEART RISK PREDICTION SERVICE - METRICS             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests: {:>8}  │  Throughput: {:>6.1} req/s               ║",
            total, throughput
        );
        info!(
            "║ Served: {:>8}  Rejected: {:>6} ({:>5.1}%)  Failed: {:>6}  ║",
            served, rejected, reject_rate, failed
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Verdicts:                                                    ║");
        for verdict in [Verdict::HeartDisease, Verdict::NoDisease] {
            let count = verdicts.get(&verdict).copied().unwrap_or(0);
            let pct = if served > 0 {
                (count as f64 / served as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:14}: {:>6} ({:>5.1}%)                            ║", verdict.label(), count, pct);
        }
        if !rejections.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Rejections by Kind:                                          ║");
            for (kind, count) in &rejections {
                info!("║   {:14}: {:>6}                                      ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Disease Probability Distribution:                            ║");
        let reported: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if reported > 0 {
                (count as f64 / reported as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:>3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
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
    metrics: Arc<ServingMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServingMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::Confidence;

    fn result(verdict: Verdict, disease: f64) -> PredictionResult {
        PredictionResult {
            verdict,
            confidence: Some(Confidence::from_disease_probability(disease).unwrap()),
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ServingMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &result(Verdict::HeartDisease, 0.8));
        metrics.record_prediction(Duration::from_micros(200), &result(Verdict::NoDisease, 0.1));
        metrics.record_rejection(Duration::from_micros(50), "range");
        metrics.record_failure(Duration::from_micros(70));

        assert_eq!(metrics.requests_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.requests_rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_requests(), 4);
        assert_eq!(metrics.get_verdicts().get(&Verdict::HeartDisease), Some(&1));
        assert_eq!(metrics.get_rejections_by_kind().get("range"), Some(&1));
    }

    #[test]
    fn test_confidence_buckets() {
        let metrics = ServingMetrics::new();
        metrics.record_prediction(Duration::from_micros(10), &result(Verdict::HeartDisease, 1.0));
        metrics.record_prediction(Duration::from_micros(10), &result(Verdict::NoDisease, 0.05));

        let distribution = metrics.get_confidence_distribution();
        assert_eq!(distribution[9], 1);
        assert_eq!(distribution[0], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ServingMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_failure(Duration::from_micros(us));
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }
}
