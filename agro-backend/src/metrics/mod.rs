//! In-process request metrics.
//!
//! Counters plus a sliding window of the last request durations, exposed
//! through the metrics endpoint. No external sinks; this exists so an
//! operator can curl one endpoint and see whether the service is healthy
//! and how slow the model calls are.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

/// How many request durations the sliding window keeps.
const WINDOW: usize = 1000;

/// p95 is reported as 0 until the window holds more samples than this;
/// a percentile over a handful of requests is noise, not signal.
const P95_MIN_SAMPLES: usize = 20;

#[derive(Default)]
struct MetricsInner {
    durations: VecDeque<f64>,
    total_requests: u64,
    cache_hits: u64,
    failures: u64,
}

pub struct RequestMetrics {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub failures: u64,
    /// Number of samples currently in the window.
    pub window_size: usize,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    /// 0 until the window exceeds `P95_MIN_SAMPLES`.
    pub p95_duration: f64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        RequestMetrics {
            inner: Mutex::new(MetricsInner::default()),
        }
    }

    /// Record a full pipeline run with its duration in seconds.
    pub fn record_request(&self, duration_seconds: f64) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.durations.push_back(duration_seconds);
        if inner.durations.len() > WINDOW {
            inner.durations.pop_front();
        }
    }

    /// Record a request served from the response cache.
    pub fn record_cache_hit(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.cache_hits += 1;
    }

    /// Record a request that failed in the pipeline.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.failures += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let count = inner.durations.len();

        if count == 0 {
            return MetricsSnapshot {
                total_requests: inner.total_requests,
                cache_hits: inner.cache_hits,
                failures: inner.failures,
                window_size: 0,
                avg_duration: 0.0,
                min_duration: 0.0,
                max_duration: 0.0,
                p95_duration: 0.0,
            };
        }

        let mut sorted: Vec<f64> = inner.durations.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let sum: f64 = sorted.iter().sum();
        let p95 = if count > P95_MIN_SAMPLES {
            let index = ((count as f64 * 0.95).ceil() as usize)
                .saturating_sub(1)
                .min(count - 1);
            sorted[index]
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: inner.total_requests,
            cache_hits: inner.cache_hits,
            failures: inner.failures,
            window_size: count,
            avg_duration: sum / count as f64,
            min_duration: sorted[0],
            max_duration: sorted[count - 1],
            p95_duration: p95,
        }
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_all_zeros() {
        let metrics = RequestMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.window_size, 0);
        assert_eq!(snapshot.avg_duration, 0.0);
        assert_eq!(snapshot.p95_duration, 0.0);
    }

    #[test]
    fn test_counters_and_window_stats() {
        let metrics = RequestMetrics::new();
        metrics.record_request(1.0);
        metrics.record_request(2.0);
        metrics.record_request(3.0);
        metrics.record_cache_hit();
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 5);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.window_size, 3);
        assert!((snapshot.avg_duration - 2.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.min_duration, 1.0);
        assert_eq!(snapshot.max_duration, 3.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let metrics = RequestMetrics::new();
        for i in 0..(WINDOW + 50) {
            metrics.record_request(i as f64);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.window_size, WINDOW);
        // Oldest samples fell out of the window.
        assert_eq!(snapshot.min_duration, 50.0);
    }

    #[test]
    fn test_p95_on_uniform_samples() {
        let metrics = RequestMetrics::new();
        for i in 1..=100 {
            metrics.record_request(i as f64);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.p95_duration, 95.0);
    }

    #[test]
    fn test_p95_suppressed_until_enough_samples() {
        let metrics = RequestMetrics::new();
        for i in 1..=P95_MIN_SAMPLES {
            metrics.record_request(i as f64);
        }

        // At the threshold the percentile is still withheld, the rest of
        // the stats are not.
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.p95_duration, 0.0);
        assert_eq!(snapshot.min_duration, 1.0);
        assert_eq!(snapshot.max_duration, P95_MIN_SAMPLES as f64);

        metrics.record_request(21.0);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.p95_duration, 20.0);
    }
}
