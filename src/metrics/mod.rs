//! Metrics module
//!
//! Prometheus counters and histograms for extraction jobs. There is no
//! scrape endpoint in a Lambda; [`render`] produces the text exposition for
//! logging or printing.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Extraction metrics
    pub static ref EXTRACTIONS_TOTAL: CounterVec = register_counter_vec!(
        "unpackr_extractions_total",
        "Total extraction jobs",
        &["format", "status"]
    ).unwrap();

    pub static ref MEMBERS_TOTAL: CounterVec = register_counter_vec!(
        "unpackr_members_total",
        "Archive members uploaded",
        &["format"]
    ).unwrap();

    pub static ref EXTRACTION_DURATION: HistogramVec = register_histogram_vec!(
        "unpackr_extraction_duration_seconds",
        "Extraction job duration in seconds",
        &["format"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();

    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "unpackr_uploads_total",
        "Total direct uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "unpackr_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "unpackr_upload_duration_seconds",
        "Upload duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "unpackr_multipart_uploads_total",
        "Total multipart uploads",
        &["status"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "unpackr_multipart_parts",
        "Number of parts per multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "unpackr_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a finished extraction job
pub fn record_extraction(format: &str, success: bool, members: usize, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    EXTRACTIONS_TOTAL.with_label_values(&[format, status]).inc();
    MEMBERS_TOTAL
        .with_label_values(&[format])
        .inc_by(members as f64);
    EXTRACTION_DURATION
        .with_label_values(&[format])
        .observe(duration_secs);
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    record_upload_bytes(bytes);
}

/// Count bytes written without counting an upload (multipart parts)
pub fn record_upload_bytes(bytes: u64) {
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(method: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

/// Record an error by class
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Record a successful multipart upload
pub fn record_multipart_upload_success(parts_count: usize) {
    MULTIPART_UPLOADS.with_label_values(&["success"]).inc();
    MULTIPART_PARTS.observe(parts_count as f64);
}

/// Record a failed (aborted) multipart upload
pub fn record_multipart_upload_failure() {
    MULTIPART_UPLOADS.with_label_values(&["failure"]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
