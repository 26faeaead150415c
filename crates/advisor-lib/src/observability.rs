//! Observability infrastructure for the crop advisor
//!
//! Provides:
//! - Prometheus metrics (training time, prediction latency, sensor fallbacks, model version)
//! - Structured logging with tracing, one event per significant action

use crate::models::CropPrediction;
use crate::sensor::FallbackReason;
use crate::store::StoredModel;
use crate::training::EvaluationReport;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter, Encoder, Gauge,
    GaugeVec, Histogram, IntCounter, TextEncoder,
};
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Histogram buckets for training runs (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AdvisorMetricsInner> = OnceLock::new();

struct AdvisorMetricsInner {
    training_duration_seconds: Histogram,
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    sensor_fallbacks_total: IntCounter,
    holdout_accuracy: Gauge,
    model_version_info: GaugeVec,
}

impl AdvisorMetricsInner {
    fn new() -> Self {
        Self {
            training_duration_seconds: register_histogram!(
                "crop_advisor_training_duration_seconds",
                "Wall time of a full split, fit and evaluate run",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            prediction_latency_seconds: register_histogram!(
                "crop_advisor_prediction_latency_seconds",
                "Time spent scaling and classifying one feature vector",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "crop_advisor_predictions_total",
                "Total number of crop predictions generated"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "crop_advisor_prediction_errors_total",
                "Total number of failed prediction attempts"
            )
            .expect("Failed to register prediction_errors_total"),

            sensor_fallbacks_total: register_int_counter!(
                "crop_advisor_sensor_fallbacks_total",
                "Sensor reads that fell back to the default feature vector"
            )
            .expect("Failed to register sensor_fallbacks_total"),

            holdout_accuracy: register_gauge!(
                "crop_advisor_holdout_accuracy",
                "Held-out accuracy of the most recently trained model"
            )
            .expect("Failed to register holdout_accuracy"),

            model_version_info: register_gauge_vec!(
                "crop_advisor_model_version_info",
                "Information about the currently active model unit",
                &["version", "n_classes"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Handle to the process-wide advisor metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone, Copy)]
pub struct AdvisorMetrics {
    inner: &'static AdvisorMetricsInner,
}

impl Default for AdvisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(AdvisorMetricsInner::new),
        }
    }

    pub fn observe_training(&self, duration: Duration, report: &EvaluationReport) {
        self.inner
            .training_duration_seconds
            .observe(duration.as_secs_f64());
        self.inner.holdout_accuracy.set(report.accuracy);
    }

    pub fn observe_prediction_latency(&self, duration: Duration) {
        self.inner
            .prediction_latency_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn inc_predictions(&self) {
        self.inner.predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner.prediction_errors_total.inc();
    }

    pub fn inc_sensor_fallbacks(&self) {
        self.inner.sensor_fallbacks_total.inc();
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str, n_classes: usize) {
        let n_classes = n_classes.to_string();
        self.inner.model_version_info.reset();
        self.inner
            .model_version_info
            .with_label_values(&[version, n_classes.as_str()])
            .set(1.0);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Write the exposition for a node-exporter textfile collector
    ///
    /// The file is replaced atomically so scrapers never see a partial write.
    pub fn write_textfile(&self, path: &Path) -> io::Result<()> {
        let body = self
            .render()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)
    }
}

/// Structured logger for advisor events
#[derive(Clone)]
pub struct StructuredLogger {
    site_name: String,
}

impl StructuredLogger {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn log_training(&self, model_version: &str, report: &EvaluationReport, duration: Duration) {
        info!(
            event = "training_completed",
            site = %self.site_name,
            model_version = %model_version,
            accuracy = report.accuracy,
            macro_f1 = report.macro_avg.f1,
            n_test = report.n_samples,
            duration_ms = duration.as_millis() as u64,
            "Model trained and evaluated"
        );
    }

    pub fn log_model_saved(&self, stored: &StoredModel) {
        info!(
            event = "model_saved",
            site = %self.site_name,
            model_version = %stored.version,
            path = %stored.path.display(),
            checksum = %stored.checksum,
            size_bytes = stored.size_bytes,
            "Model unit saved"
        );
    }

    pub fn log_model_loaded(&self, model_version: &str, path: &Path) {
        info!(
            event = "model_loaded",
            site = %self.site_name,
            model_version = %model_version,
            path = %path.display(),
            "Model unit loaded"
        );
    }

    pub fn log_prediction(&self, prediction: &CropPrediction, from_sensor: bool) {
        info!(
            event = "prediction_generated",
            site = %self.site_name,
            label = %prediction.label,
            confidence = prediction.confidence(),
            model_version = %prediction.model_version,
            live_sensor = from_sensor,
            "Generated crop recommendation"
        );
    }

    pub fn log_sensor_fallback(&self, reason: &FallbackReason) {
        warn!(
            event = "sensor_fallback",
            site = %self.site_name,
            reason = %reason,
            "Sensor unavailable, predicting from default feature vector"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "agent_started",
            site = %self.site_name,
            agent_version = %version,
            model_version = %model_version,
            "Crop advisor agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            site = %self.site_name,
            reason = %reason,
            "Crop advisor agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::evaluate;
    use tempfile::TempDir;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metrics_render() {
        let metrics = AdvisorMetrics::new();
        let report = evaluate(&labels(&["rice", "maize"]), &labels(&["rice", "rice"]));

        metrics.observe_training(Duration::from_millis(1500), &report);
        metrics.observe_prediction_latency(Duration::from_micros(300));
        metrics.inc_predictions();
        metrics.inc_sensor_fallbacks();
        metrics.set_model_version("v20240101000000", 2);

        let text = metrics.render().unwrap();
        assert!(text.contains("crop_advisor_predictions_total"));
        assert!(text.contains("crop_advisor_holdout_accuracy"));
        assert!(text.contains("version=\"v20240101000000\""));
    }

    #[test]
    fn test_handles_share_registry() {
        let a = AdvisorMetrics::new();
        let b = AdvisorMetrics::default();
        assert!(std::ptr::eq(a.inner, b.inner));
    }

    #[test]
    fn test_write_textfile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crop_advisor.prom");
        AdvisorMetrics::new().write_textfile(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("crop_advisor_prediction_errors_total"));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-farm");
        assert_eq!(logger.site_name(), "test-farm");
    }
}
