use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Exam session metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_sessions_total",
        "Exam session lifecycle events",
        &["event"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "exam_sessions_active",
        "Number of exam sessions not yet torn down"
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_submissions_total",
        "Submissions by winning trigger",
        &["reason"]
    )
    .unwrap();

    pub static ref SCORING_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_scoring_requests_total",
        "Submission POSTs to the scoring API",
        &["status"]
    )
    .unwrap();

    pub static ref INTEGRITY_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_integrity_violations_total",
        "Visibility losses during active sessions",
        &["outcome"]
    )
    .unwrap();

    pub static ref DEADLINE_TICKS_TOTAL: IntCounter = register_int_counter!(
        "exam_deadline_ticks_total",
        "Deadline controller ticks"
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
