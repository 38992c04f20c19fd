//! Request metrics and statistics tracking for the scoring service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the request pipeline
pub struct ServiceMetrics {
    /// Total requests that produced a prediction
    pub predictions: AtomicU64,
    /// Total requests that failed
    pub errors: AtomicU64,
    /// Predictions by domain
    by_domain: RwLock<HashMap<String, u64>>,
    /// Predictions by `domain:verdict`
    by_verdict: RwLock<HashMap<String, u64>>,
    /// Failures by error kind
    errors_by_kind: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            by_domain: RwLock::new(HashMap::new()),
            by_verdict: RwLock::new(HashMap::new()),
            errors_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed prediction
    pub fn record_prediction(
        &self,
        domain: &str,
        verdict: &str,
        probability: f64,
        processing_time: Duration,
    ) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut by_domain) = self.by_domain.write() {
            *by_domain.entry(domain.to_string()).or_insert(0) += 1;
        }
        if let Ok(mut by_verdict) = self.by_verdict.write() {
            *by_verdict.entry(format!("{}:{}", domain, verdict)).or_insert(0) += 1;
        }

        let bucket = (probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request
    pub fn record_error(&self, kind: &str, processing_time: Duration) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut by_kind) = self.errors_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let total = self.predictions.load(Ordering::Relaxed) + self.errors.load(Ordering::Relaxed);
        if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_by_domain(&self) -> HashMap<String, u64> {
        self.by_domain.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_by_verdict(&self) -> HashMap<String, u64> {
        self.by_verdict.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_errors_by_kind(&self) -> HashMap<String, u64> {
        self.errors_by_kind
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            predictions = predictions,
            errors = errors,
            throughput = format!("{:.1} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Scoring service summary"
        );

        let mut by_verdict: Vec<_> = self.get_by_verdict().into_iter().collect();
        by_verdict.sort();
        for (verdict, count) in by_verdict {
            info!(verdict = %verdict, count = count, "Verdicts");
        }

        for (kind, count) in self.get_errors_by_kind() {
            info!(kind = %kind, count = count, "Errors");
        }

        let distribution = self.get_score_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = (count as f64 / total as f64) * 100.0;
            info!(
                "  p {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "█".repeat(((pct / 2.0) as usize).min(20))
            );
        }
    }
}

impl Default for ServiceMetrics {
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

/// Periodic metrics summary logger
pub struct MetricsReporter {
    metrics: std::sync::Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
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

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction("credit_risk", "High", 0.8, Duration::from_micros(100));
        metrics.record_prediction("credit_risk", "Low", 0.1, Duration::from_micros(200));
        metrics.record_prediction("fraud_detection", "Fraud", 1.0, Duration::from_micros(300));
        metrics.record_error("validation", Duration::from_micros(50));

        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_by_domain()["credit_risk"], 2);
        assert_eq!(metrics.get_by_verdict()["fraud_detection:Fraud"], 1);
        assert_eq!(metrics.get_errors_by_kind()["validation"], 1);

        let distribution = metrics.get_score_distribution();
        assert_eq!(distribution[9], 1);
        assert_eq!(distribution[8], 1);
        assert_eq!(distribution[1], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in 1..=100 {
            metrics.record_error("inference", Duration::from_micros(us));
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
    }
}
