//! Metrics module
//!
//! Prometheus counters for uploads and page actions. The process is short-lived,
//! so metrics are rendered on demand with [`gather_text`] instead of being scraped.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "skylib_uploads_total",
        "Total number of uploads",
        &["mode", "status"]
    ).unwrap();

    pub static ref UPLOAD_PARTS_TOTAL: CounterVec = register_counter_vec!(
        "skylib_upload_parts_total",
        "Multipart parts sent to object storage",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "skylib_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "skylib_upload_duration_seconds",
        "Upload duration in seconds",
        &["mode"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();

    pub static ref MULTIPART_ABORTS: Counter = register_counter!(
        "skylib_multipart_aborts_total",
        "Multipart uploads aborted after a part failure or cancellation"
    ).unwrap();

    // Page metrics
    pub static ref PAGE_ACTIONS_TOTAL: CounterVec = register_counter_vec!(
        "skylib_page_actions_total",
        "Page action round trips",
        &["request_type", "outcome"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(mode: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[mode, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(mode: &str) {
    UPLOADS_TOTAL.with_label_values(&[mode, "failure"]).inc();
}

/// Record a cancelled upload
pub fn record_upload_cancelled(mode: &str) {
    UPLOADS_TOTAL.with_label_values(&[mode, "cancelled"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(mode: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[mode])
        .observe(duration_secs);
}

/// Record the outcome of a single part PUT
pub fn record_part(success: bool) {
    let status = if success { "success" } else { "failure" };
    UPLOAD_PARTS_TOTAL.with_label_values(&[status]).inc();
}

/// Record an abort request
pub fn record_abort() {
    MULTIPART_ABORTS.inc();
}

/// Record a page action round trip
pub fn record_page_action(request_type: &str, outcome: &str) {
    PAGE_ACTIONS_TOTAL
        .with_label_values(&[request_type, outcome])
        .inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
