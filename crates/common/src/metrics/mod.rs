//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Recruit Radar metrics
pub const METRICS_PREFIX: &str = "recruit_radar";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for upstream LLM latency (streams run for tens of seconds)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total upstream chat completion requests"
    );

    describe_histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time until the upstream responded with headers"
    );

    // Stream metrics
    describe_counter!(
        format!("{}_stream_chunks_total", METRICS_PREFIX),
        Unit::Count,
        "Total streamed body chunks consumed"
    );

    describe_counter!(
        format!("{}_stream_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total streamed body bytes consumed"
    );

    describe_counter!(
        format!("{}_stream_unparseable_lines_total", METRICS_PREFIX),
        Unit::Count,
        "Stream data lines skipped because they were not valid JSON"
    );

    // Extraction metrics
    describe_counter!(
        format!("{}_extractions_total", METRICS_PREFIX),
        Unit::Count,
        "Extraction outcomes by strategy (raw when none matched)"
    );

    describe_counter!(
        format!("{}_candidates_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Total candidate records extracted"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record upstream call metrics
pub fn record_upstream(duration_secs: f64, provider: &str, model: &str, stream: bool, status: u16) {
    counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "stream" => stream.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "stream" => stream.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a finished stream reassembly
pub fn record_stream(chunks: usize, bytes: usize, unparseable: usize) {
    counter!(format!("{}_stream_chunks_total", METRICS_PREFIX)).increment(chunks as u64);
    counter!(format!("{}_stream_bytes_total", METRICS_PREFIX)).increment(bytes as u64);
    if unparseable > 0 {
        counter!(format!("{}_stream_unparseable_lines_total", METRICS_PREFIX))
            .increment(unparseable as u64);
    }
}

/// Helper to record extraction outcome
pub fn record_extraction(strategy: &str, candidates: usize) {
    counter!(
        format!("{}_extractions_total", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .increment(1);

    counter!(format!("{}_candidates_extracted_total", METRICS_PREFIX))
        .increment(candidates as u64);
}
